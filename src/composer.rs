//! Request composer: turns form selections into a prompt plus a response schema

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::deliverables::{DeliverableKind, DeliverableSelection, HdlLanguage};

/// One generation request as submitted from the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignRequest {
    pub description: String,
    pub hdl_language: HdlLanguage,
    pub requested_deliverables: Vec<String>,
}

impl DesignRequest {
    pub fn new(
        description: impl Into<String>,
        hdl_language: HdlLanguage,
        requested_deliverables: Vec<String>,
    ) -> Self {
        Self {
            description: description.into(),
            hdl_language,
            requested_deliverables,
        }
    }

    pub fn from_selection(
        description: impl Into<String>,
        hdl_language: HdlLanguage,
        selection: &DeliverableSelection,
    ) -> Self {
        Self::new(description, hdl_language, selection.requested())
    }

    pub fn compose(&self) -> ComposedRequest {
        compose(
            &self.description,
            self.hdl_language,
            &self.requested_deliverables,
        )
    }
}

/// Prompt text and structured-output schema for one call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedRequest {
    pub prompt: String,
    pub schema: Value,
}

/// Resolve a deliverable id to its prompt phrase; unknown ids pass through verbatim
pub fn resolve_phrase(id: &str, language: HdlLanguage) -> String {
    DeliverableKind::from_id(id)
        .map(|kind| kind.phrase(language))
        .unwrap_or_else(|| id.to_string())
}

pub fn compose<S: AsRef<str>>(
    description: &str,
    language: HdlLanguage,
    requested: &[S],
) -> ComposedRequest {
    let deliverable_list = requested
        .iter()
        .map(|id| resolve_phrase(id.as_ref(), language))
        .collect::<Vec<_>>()
        .join(", ");
    let key_list = requested
        .iter()
        .map(|id| format!("\"{}\"", id.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    let markdown_kinds = DeliverableKind::ALL
        .iter()
        .filter(|k| k.is_documentation())
        .map(|k| k.label().to_lowercase())
        .collect::<Vec<_>>()
        .join(", ");

    let prompt = format!(
        "You are an expert hardware design and verification engineer.\n\
         \n\
         Design description:\n\
         {description}\n\
         \n\
         Target HDL for the RTL: {language}\n\
         The verification environment is SystemVerilog/UVM.\n\
         \n\
         Generate the following deliverables: {deliverable_list}.\n\
         \n\
         Instructions:\n\
         - Every generated file must be syntactically correct and complete; do not leave placeholders.\n\
         - Documentation deliverables ({markdown_kinds}) must be written in Markdown.\n\
         - Respond with a single JSON object containing ONLY the keys for the requested deliverables: {key_list}.\n\
         - Each key maps to an object with the string fields \"filename\", \"language\" and \"code\".\n\
         - Do not include any prose before or after the JSON, and do not wrap it in Markdown code fences."
    );

    ComposedRequest {
        prompt,
        schema: output_schema(),
    }
}

static OUTPUT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let file_record = json!({
        "type": "OBJECT",
        "properties": {
            "filename": { "type": "STRING" },
            "language": { "type": "STRING" },
            "code": { "type": "STRING" }
        },
        "required": ["filename", "language", "code"]
    });

    let mut properties = Map::new();
    for kind in DeliverableKind::ALL {
        let mut entry = file_record.clone();
        entry["description"] = Value::String(kind.label().to_string());
        properties.insert(kind.id().to_string(), entry);
    }

    json!({
        "type": "OBJECT",
        "properties": properties
    })
});

/// Response shape sent alongside every prompt; independent of the requested set
pub fn output_schema() -> Value {
    OUTPUT_SCHEMA.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESC: &str = "A 4-bit synchronous up-counter with active-low reset";

    #[test]
    fn test_prompt_contains_description_exactly_once() {
        let composed = compose(DESC, HdlLanguage::Verilog, &["rtlCode", "testbench"]);
        assert_eq!(composed.prompt.matches(DESC).count(), 1);
    }

    #[test]
    fn test_deliverable_clause_preserves_order() {
        let composed = compose(
            DESC,
            HdlLanguage::Vhdl,
            &["testbench", "documentation", "rtlCode"],
        );
        assert!(composed.prompt.contains(
            "Generate the following deliverables: SystemVerilog/UVM Testbench, \
             Design Documentation (Markdown), RTL Code in VHDL."
        ));
    }

    #[test]
    fn test_clause_lists_one_phrase_per_id_for_every_language() {
        let all: Vec<&str> = DeliverableKind::ALL.iter().map(|k| k.id()).collect();
        let reversed: Vec<&str> = all.iter().rev().copied().collect();
        let subsets: Vec<Vec<&str>> = vec![
            vec!["rtlCode"],
            vec!["documentation", "rtlCode"],
            vec!["coverage", "testCases", "assertions"],
            vec!["verificationPlan", "customLint", "testbench"],
            all,
            reversed,
        ];
        let descriptions = [
            DESC,
            "UART TX\n  8N1, 115200 baud, \"quoted\" {braces}",
            "AXI4-Lite slave with 4 registers: ctrl, status, irq_mask, irq_status",
        ];

        for language in HdlLanguage::ALL {
            for ids in &subsets {
                for description in descriptions {
                    let composed = compose(description, language, ids);
                    assert_eq!(composed.prompt.matches(description).count(), 1);
                    let target = format!("Target HDL for the RTL: {}", language);
                    assert!(composed.prompt.contains(&target));

                    let phrases: Vec<String> =
                        ids.iter().map(|id| resolve_phrase(id, language)).collect();
                    let clause =
                        format!("Generate the following deliverables: {}.\n", phrases.join(", "));
                    assert!(composed.prompt.contains(&clause), "missing clause: {}", clause);
                }
            }
        }
    }

    #[test]
    fn test_markdown_instruction_names_documentation_kinds() {
        let composed = compose(DESC, HdlLanguage::Verilog, &["rtlCode"]);
        assert!(composed.prompt.contains(
            "Documentation deliverables (verification plan, design documentation) \
             must be written in Markdown."
        ));
    }

    #[test]
    fn test_unknown_id_passes_through() {
        let composed = compose(DESC, HdlLanguage::Verilog, &["rtlCode", "synthesisScript"]);
        assert!(
            composed
                .prompt
                .contains("RTL Code in Verilog, synthesisScript.")
        );
    }

    #[test]
    fn test_empty_request_still_composes() {
        let none: [&str; 0] = [];
        let composed = compose(DESC, HdlLanguage::Verilog, &none);
        assert!(composed.prompt.contains("Generate the following deliverables: ."));
        assert_eq!(composed.schema, output_schema());
    }

    #[test]
    fn test_prompt_names_requested_keys_and_fixed_framing() {
        let composed = compose(DESC, HdlLanguage::Verilog, &["rtlCode", "testCases"]);
        assert!(composed.prompt.contains("expert hardware design and verification engineer"));
        assert!(composed.prompt.contains("verification environment is SystemVerilog/UVM"));
        let keys = "ONLY the keys for the requested deliverables: \"rtlCode\", \"testCases\"";
        assert!(composed.prompt.contains(keys));
        assert!(composed.prompt.contains("Markdown code fences"));
    }

    #[test]
    fn test_schema_covers_every_kind_with_required_fields() {
        let schema = output_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert!(schema.get("required").is_none());
        let props = schema["properties"].as_object().expect("properties object");
        assert_eq!(props.len(), DeliverableKind::ALL.len());
        for kind in DeliverableKind::ALL {
            let entry = &props[kind.id()];
            assert_eq!(entry["type"], "OBJECT");
            assert_eq!(entry["required"], json!(["filename", "language", "code"]));
            for field in ["filename", "language", "code"] {
                assert_eq!(entry["properties"][field]["type"], "STRING");
            }
        }
    }

    #[test]
    fn test_schema_does_not_vary_with_request() {
        let a = compose(DESC, HdlLanguage::Verilog, &["rtlCode"]);
        let b = compose(DESC, HdlLanguage::Vhdl, &["coverage", "assertions"]);
        assert_eq!(a.schema, b.schema);
    }

    #[test]
    fn test_design_request_from_selection() {
        let mut selection = DeliverableSelection::new();
        selection.toggle("testbench");
        selection.toggle("assertions");
        let request = DesignRequest::from_selection(DESC, HdlLanguage::Vhdl, &selection);
        assert_eq!(
            request.requested_deliverables,
            vec!["rtlCode".to_string(), "assertions".to_string()]
        );
        assert!(request.compose().prompt.contains(
            "RTL Code in VHDL, SystemVerilog Assertions (SVA) for the design."
        ));
    }
}
