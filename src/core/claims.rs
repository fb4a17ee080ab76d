//! Purpose: Project parsed 837-style documents into a flat claims view.
//! Exports: `claims_json`.
//! Role: Semantic layer over the structural tree; never re-tokenizes input.
//! Invariants: Extraction is lenient by nature; unfit segments are skipped.
//! Invariants: Key order within a claim follows segment encounter order.
use serde_json::{Map, Number, Value};

use crate::core::envelope::Interchange;
use crate::core::hloop::LoopNode;
use crate::core::segment::{Element, Segment};

/// Collect every claim in the interchange as `{"claims": [...]}`.
pub fn claims_json(interchange: &Interchange) -> Value {
    let mut extractor = Extractor::default();
    for group in &interchange.groups {
        for txn in &group.transaction_sets {
            for segment in &txn.loops.leading {
                extractor.feed(segment);
            }
            for root in &txn.loops.roots {
                extractor.feed_loop(root);
            }
        }
    }
    let claims = extractor.finish();

    let mut out = Map::new();
    out.insert("claims".to_string(), Value::Array(claims));
    Value::Object(out)
}

#[derive(Default)]
struct Extractor {
    claims: Vec<Value>,
    current: Option<Map<String, Value>>,
}

impl Extractor {
    fn feed_loop(&mut self, node: &LoopNode) {
        for segment in &node.segments {
            self.feed(segment);
        }
        for child in &node.children {
            self.feed_loop(child);
        }
    }

    fn feed(&mut self, segment: &Segment) {
        match segment.id.as_str() {
            "CLM" => self.start_claim(segment),
            "NM1" => self.name(segment),
            "N3" => self.address_line(segment),
            "N4" => self.address_city(segment),
            "DMG" => self.demographics(segment),
            "HI" => self.diagnoses(segment),
            "SV1" => self.service(segment),
            "DTP" => self.dates(segment),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Value> {
        self.flush();
        self.claims
    }

    fn flush(&mut self) {
        if let Some(claim) = self.current.take()
            && !claim.is_empty()
        {
            self.claims.push(Value::Object(claim));
        }
    }

    fn start_claim(&mut self, segment: &Segment) {
        self.flush();
        let mut claim = Map::new();
        claim.insert("claim_number".to_string(), text_or_null(segment, 1));
        claim.insert("amount".to_string(), number_or_null(segment, 2));
        claim.insert(
            "claim_type".to_string(),
            first_component(segment, 3)
                .filter(|value| !value.is_empty())
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        self.current = Some(claim);
    }

    fn name(&mut self, segment: &Segment) {
        let Some(claim) = self.current.as_mut() else {
            return;
        };
        let qualifier = segment.value(1).unwrap_or("").trim();
        if qualifier == "77" {
            let mut facility = Map::new();
            facility.insert("name".to_string(), text_or_null(segment, 3));
            facility.insert("id".to_string(), text_or_null(segment, 9));
            claim.insert("service_facility".to_string(), Value::Object(facility));
            return;
        }

        let key = match qualifier {
            "IL" => "insured",
            "QC" => "patient",
            "82" => "rendering_provider",
            "DN" => "referring_provider",
            _ => return,
        };
        let mut name = Map::new();
        name.insert("last_name".to_string(), text_or_null(segment, 3));
        name.insert("first_name".to_string(), text_or_null(segment, 4));
        name.insert("middle_name".to_string(), text_or_null(segment, 5));
        name.insert("id_number".to_string(), text_or_null(segment, 9));
        claim.insert(key.to_string(), Value::Object(name));
    }

    fn address_line(&mut self, segment: &Segment) {
        let mut address = Map::new();
        address.insert("address_line_1".to_string(), text_or_null(segment, 1));
        address.insert("address_line_2".to_string(), text_or_null(segment, 2));
        self.merge_address(address);
    }

    fn address_city(&mut self, segment: &Segment) {
        let mut address = Map::new();
        address.insert("city".to_string(), text_or_null(segment, 1));
        address.insert("state".to_string(), text_or_null(segment, 2));
        address.insert("zip".to_string(), text_or_null(segment, 3));
        self.merge_address(address);
    }

    // Address segments bind to the service facility once one was named,
    // otherwise to the claim itself.
    fn merge_address(&mut self, fields: Map<String, Value>) {
        let Some(claim) = self.current.as_mut() else {
            return;
        };
        let target = match claim.get_mut("service_facility") {
            Some(Value::Object(facility)) => facility
                .entry("address".to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => claim
                .entry("address".to_string())
                .or_insert_with(|| Value::Object(Map::new())),
        };
        if let Value::Object(address) = target {
            for (key, value) in fields {
                address.insert(key, value);
            }
        }
    }

    fn demographics(&mut self, segment: &Segment) {
        let Some(claim) = self.current.as_mut() else {
            return;
        };
        let mut demographics = Map::new();
        demographics.insert(
            "date_of_birth".to_string(),
            segment
                .value(2)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| Value::from(reformat_date(value)))
                .unwrap_or(Value::Null),
        );
        demographics.insert("gender".to_string(), text_or_null(segment, 3));
        claim.insert("demographics".to_string(), Value::Object(demographics));
    }

    fn diagnoses(&mut self, segment: &Segment) {
        let Some(claim) = self.current.as_mut() else {
            return;
        };
        let mut codes = Vec::new();
        for element in &segment.elements {
            if let Some(parts) = element.components()
                && parts.len() > 1
            {
                let code = parts[1].trim();
                if !code.is_empty() {
                    codes.push(Value::from(code));
                }
            }
        }
        if !codes.is_empty() {
            claim.insert("diagnoses".to_string(), Value::Array(codes));
        }
    }

    fn service(&mut self, segment: &Segment) {
        let Some(claim) = self.current.as_mut() else {
            return;
        };
        let Some(procedure) = segment.element(1) else {
            return;
        };
        let procedure_code = match procedure {
            Element::Composite(parts) if parts.len() > 1 => parts[1].trim().to_string(),
            Element::Composite(parts) => parts.first().cloned().unwrap_or_default(),
            Element::Value(value) => value.trim().to_string(),
            Element::Repeated(_) => return,
        };

        let mut service = Map::new();
        service.insert("procedure_code".to_string(), Value::from(procedure_code));
        service.insert("amount".to_string(), number_or_null(segment, 2));
        service.insert("units".to_string(), text_or_null(segment, 4));

        let services = claim
            .entry("services".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = services {
            items.push(Value::Object(service));
        }
    }

    fn dates(&mut self, segment: &Segment) {
        let Some(claim) = self.current.as_mut() else {
            return;
        };
        // 472 qualifies a service date; other DTP qualifiers are out of scope.
        if segment.value(1).map(str::trim) != Some("472") {
            return;
        }
        if let Some(date) = segment.value(3).map(str::trim).filter(|v| !v.is_empty()) {
            claim.insert(
                "service_date".to_string(),
                Value::from(reformat_date(date)),
            );
        }
    }
}

fn text_or_null(segment: &Segment, position: usize) -> Value {
    segment
        .value(position)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn number_or_null(segment: &Segment, position: usize) -> Value {
    segment
        .value(position)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<f64>().ok())
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn first_component(segment: &Segment, position: usize) -> Option<String> {
    match segment.element(position)? {
        Element::Value(value) => Some(value.trim().to_string()),
        Element::Composite(parts) => parts.first().map(|part| part.trim().to_string()),
        Element::Repeated(_) => None,
    }
}

/// `YYYYMMDD` → `YYYY-MM-DD`; anything else passes through verbatim.
fn reformat_date(value: &str) -> String {
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &value[0..4], &value[4..6], &value[6..8])
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::claims_json;
    use crate::core::parse::{DecodeOptions, decode_str};

    fn document(body: &[&str]) -> String {
        let mut doc = String::from_utf8(crate::core::delim::test_header(b'^')).expect("utf8");
        doc.push_str("GS*HC*APP*APP*20240101*1200*1*X*005010~");
        doc.push_str("ST*837*0001~");
        for segment in body {
            doc.push_str(segment);
            doc.push('~');
        }
        doc.push_str(&format!("SE*{}*0001~", body.len() + 2));
        doc.push_str("GE*1*1~IEA*1*000000001~");
        doc
    }

    fn extract(body: &[&str]) -> serde_json::Value {
        let interchanges =
            decode_str(&document(body), DecodeOptions::default()).expect("decode");
        claims_json(&interchanges[0])
    }

    #[test]
    fn extracts_claim_header_fields() {
        let value = extract(&["CLM*12345*100*24>B>1*Y*A"]);
        let claim = &value["claims"][0];
        assert_eq!(claim["claim_number"], "12345");
        assert_eq!(claim["amount"], 100.0);
        assert_eq!(claim["claim_type"], "24");
    }

    #[test]
    fn routes_names_by_entity_qualifier() {
        let value = extract(&[
            "CLM*12345*100*24>B>1",
            "NM1*IL*1*DOE*JOHN*Q***MI*98765",
            "NM1*82*1*SMITH*ANNA",
            "NM1*77*2*MAIN CLINIC******XX*555",
        ]);
        let claim = &value["claims"][0];
        assert_eq!(claim["insured"]["last_name"], "DOE");
        assert_eq!(claim["insured"]["first_name"], "JOHN");
        assert_eq!(claim["insured"]["id_number"], "98765");
        assert_eq!(claim["rendering_provider"]["last_name"], "SMITH");
        assert_eq!(claim["service_facility"]["name"], "MAIN CLINIC");
        assert_eq!(claim["service_facility"]["id"], "555");
    }

    #[test]
    fn addresses_bind_to_facility_when_present() {
        let value = extract(&[
            "CLM*1*50*11>B>1",
            "N3*12 OAK ST",
            "N4*SPRINGFIELD*IL*62704",
            "NM1*77*2*MAIN CLINIC******XX*555",
            "N3*90 ELM AVE",
            "N4*DAYTON*OH*45402",
        ]);
        let claim = &value["claims"][0];
        assert_eq!(claim["address"]["address_line_1"], "12 OAK ST");
        assert_eq!(claim["address"]["city"], "SPRINGFIELD");
        assert_eq!(
            claim["service_facility"]["address"]["address_line_1"],
            "90 ELM AVE"
        );
        assert_eq!(claim["service_facility"]["address"]["state"], "OH");
    }

    #[test]
    fn demographics_and_dates_are_reformatted() {
        let value = extract(&["CLM*1*50*11>B>1", "DMG*D8*19700131*M", "DTP*472*D8*20240215"]);
        let claim = &value["claims"][0];
        assert_eq!(claim["demographics"]["date_of_birth"], "1970-01-31");
        assert_eq!(claim["demographics"]["gender"], "M");
        assert_eq!(claim["service_date"], "2024-02-15");
    }

    #[test]
    fn malformed_dates_pass_through() {
        let value = extract(&["CLM*1*50*11>B>1", "DMG*D8*19XX0131*F"]);
        assert_eq!(
            value["claims"][0]["demographics"]["date_of_birth"],
            "19XX0131"
        );
    }

    #[test]
    fn diagnoses_take_the_second_component() {
        let value = extract(&["CLM*1*50*11>B>1", "HI*ABK>J020*ABF>K5900"]);
        let diagnoses = value["claims"][0]["diagnoses"].as_array().expect("codes");
        assert_eq!(diagnoses.len(), 2);
        assert_eq!(diagnoses[0], "J020");
        assert_eq!(diagnoses[1], "K5900");
    }

    #[test]
    fn services_accumulate_in_order() {
        let value = extract(&[
            "CLM*1*150*11>B>1",
            "SV1*HC>99213*75*UN*1",
            "SV1*HC>87070*75*UN*2",
        ]);
        let services = value["claims"][0]["services"].as_array().expect("services");
        assert_eq!(services[0]["procedure_code"], "99213");
        assert_eq!(services[0]["amount"], 75.0);
        assert_eq!(services[0]["units"], "1");
        assert_eq!(services[1]["procedure_code"], "87070");
        assert_eq!(services[1]["units"], "2");
    }

    #[test]
    fn multiple_claims_split_on_clm() {
        let value = extract(&[
            "CLM*1*50*11>B>1",
            "NM1*QC*1*FIRST",
            "CLM*2*75*11>B>1",
            "NM1*QC*1*SECOND",
        ]);
        let claims = value["claims"].as_array().expect("claims");
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0]["patient"]["last_name"], "FIRST");
        assert_eq!(claims[1]["patient"]["last_name"], "SECOND");
    }

    #[test]
    fn segments_before_any_claim_are_ignored() {
        let value = extract(&["NM1*IL*1*DOE", "N3*STRAY ST"]);
        assert_eq!(value["claims"].as_array().expect("claims").len(), 0);
    }
}
