//! Static catalogue of target languages and deliverable kinds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target hardware description language for the RTL deliverable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HdlLanguage {
    #[serde(rename = "VHDL", alias = "vhdl")]
    Vhdl,
    #[default]
    #[serde(rename = "Verilog", alias = "verilog")]
    Verilog,
}

impl HdlLanguage {
    pub const ALL: [HdlLanguage; 2] = [HdlLanguage::Vhdl, HdlLanguage::Verilog];

    pub fn as_str(&self) -> &'static str {
        match self {
            HdlLanguage::Vhdl => "VHDL",
            HdlLanguage::Verilog => "Verilog",
        }
    }
}

impl fmt::Display for HdlLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HdlLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vhdl" => Ok(HdlLanguage::Vhdl),
            "verilog" => Ok(HdlLanguage::Verilog),
            other => Err(format!("unknown HDL '{}': expected VHDL or Verilog", other)),
        }
    }
}

/// One kind of artifact a user may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliverableKind {
    RtlCode,
    Testbench,
    TestCases,
    Assertions,
    Coverage,
    VerificationPlan,
    Documentation,
}

impl DeliverableKind {
    /// Enumeration order; also the canonical display order.
    pub const ALL: [DeliverableKind; 7] = [
        DeliverableKind::RtlCode,
        DeliverableKind::Testbench,
        DeliverableKind::TestCases,
        DeliverableKind::Assertions,
        DeliverableKind::Coverage,
        DeliverableKind::VerificationPlan,
        DeliverableKind::Documentation,
    ];

    /// Wire identifier, used as the key in the model's JSON reply
    pub fn id(&self) -> &'static str {
        match self {
            DeliverableKind::RtlCode => "rtlCode",
            DeliverableKind::Testbench => "testbench",
            DeliverableKind::TestCases => "testCases",
            DeliverableKind::Assertions => "assertions",
            DeliverableKind::Coverage => "coverage",
            DeliverableKind::VerificationPlan => "verificationPlan",
            DeliverableKind::Documentation => "documentation",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeliverableKind::RtlCode => "RTL Code",
            DeliverableKind::Testbench => "UVM Testbench",
            DeliverableKind::TestCases => "Test Cases",
            DeliverableKind::Assertions => "SVA Assertions",
            DeliverableKind::Coverage => "Functional Coverage",
            DeliverableKind::VerificationPlan => "Verification Plan",
            DeliverableKind::Documentation => "Design Documentation",
        }
    }

    /// Natural-language phrase used in the prompt's deliverable list
    pub fn phrase(&self, language: HdlLanguage) -> String {
        match self {
            DeliverableKind::RtlCode => format!("RTL Code in {}", language),
            DeliverableKind::Testbench => "SystemVerilog/UVM Testbench".to_string(),
            DeliverableKind::TestCases => "UVM Test Cases (sequences and tests)".to_string(),
            DeliverableKind::Assertions => {
                "SystemVerilog Assertions (SVA) for the design".to_string()
            }
            DeliverableKind::Coverage => "SystemVerilog functional coverage model".to_string(),
            DeliverableKind::VerificationPlan => "Verification Plan (Markdown)".to_string(),
            DeliverableKind::Documentation => "Design Documentation (Markdown)".to_string(),
        }
    }

    /// Documentation deliverables are generated as Markdown
    pub fn is_documentation(&self) -> bool {
        matches!(
            self,
            DeliverableKind::VerificationPlan | DeliverableKind::Documentation
        )
    }

    /// Checked by default in a fresh selection
    pub fn default_checked(&self) -> bool {
        matches!(self, DeliverableKind::RtlCode | DeliverableKind::Testbench)
    }

    pub fn from_id(id: &str) -> Option<DeliverableKind> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    /// Position in the enumeration
    pub fn ordinal(&self) -> usize {
        Self::ALL
            .iter()
            .position(|k| k == self)
            .unwrap_or(Self::ALL.len())
    }
}

impl fmt::Display for DeliverableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A single checkbox in the deliverable picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliverableOption {
    pub id: String,
    pub label: String,
    pub checked: bool,
}

/// Ordered checkbox state over the deliverable catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliverableSelection {
    options: Vec<DeliverableOption>,
}

impl Default for DeliverableSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliverableSelection {
    pub fn new() -> Self {
        Self {
            options: DeliverableKind::ALL
                .iter()
                .map(|k| DeliverableOption {
                    id: k.id().to_string(),
                    label: k.label().to_string(),
                    checked: k.default_checked(),
                })
                .collect(),
        }
    }

    pub fn options(&self) -> &[DeliverableOption] {
        &self.options
    }

    /// Flip one entry's checked flag. Returns the new flag, or None if the id is unknown.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let option = self.options.iter_mut().find(|o| o.id == id)?;
        option.checked = !option.checked;
        Some(option.checked)
    }

    /// Checked ids in catalogue order
    pub fn requested(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|o| o.checked)
            .map(|o| o.id.clone())
            .collect()
    }
}
