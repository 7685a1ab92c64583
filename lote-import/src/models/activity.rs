//! Row and record types flowing from the parser through the validator

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Work-item type (closed enumeration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkItemType {
    Deploy,
    Incidente,
    Melhoria,
    Suporte,
    Localizacao,
    Correcao,
    Tarefa,
}

impl WorkItemType {
    pub const ALL: [WorkItemType; 7] = [
        WorkItemType::Deploy,
        WorkItemType::Incidente,
        WorkItemType::Melhoria,
        WorkItemType::Suporte,
        WorkItemType::Localizacao,
        WorkItemType::Correcao,
        WorkItemType::Tarefa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemType::Deploy => "Deploy",
            WorkItemType::Incidente => "Incidente",
            WorkItemType::Melhoria => "Melhoria",
            WorkItemType::Suporte => "Suporte",
            WorkItemType::Localizacao => "Localizacao",
            WorkItemType::Correcao => "Correcao",
            WorkItemType::Tarefa => "Tarefa",
        }
    }
}

impl fmt::Display for WorkItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkItemType {
    type Err = String;

    /// Case-insensitive match on the type name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        WorkItemType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Tipo desconhecido: {}", wanted))
    }
}

/// Declared import mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Create new work items
    #[default]
    Create,
    /// Update existing work items identified by `id_atividade`
    Update,
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "criar" => Ok(ImportMode::Create),
            "update" | "atualizar" => Ok(ImportMode::Update),
            other => Err(format!("Modo de importação inválido: {}", other)),
        }
    }
}

/// One parsed data line: header-ordered field values plus its source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// 1-based line number in the source text
    #[serde(rename = "_originalLine")]
    pub original_line: usize,
    /// (canonical field name, raw cell text), in header order
    pub fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(original_line: usize) -> Self {
        Self {
            original_line,
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.push((field.into(), value.into()));
    }

    /// Raw value of a field, if the header carried it
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed value of a field, `None` when absent or blank
    pub fn value(&self, field: &str) -> Option<&str> {
        self.get(field).map(str::trim).filter(|v| !v.is_empty())
    }
}

/// A row that passed validation, projected onto typed fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(rename = "_originalLine")]
    pub original_line: usize,
    /// Absent only for update-mode rows that omit the type
    pub kind: Option<WorkItemType>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub urgency: Option<String>,
    pub platform: Option<String>,
    pub client_type: Option<String>,
    pub criticality: Option<String>,
    pub localization_difficulty: Option<String>,
    pub root_cause: Option<String>,
    pub warranty: Option<String>,
    pub ticket_id: Option<i64>,
    pub organization_id: Option<i64>,
    pub responsible: Option<String>,
    pub email: Option<String>,
    pub estimated_effort: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Remote identifier of the work item to update
    pub remote_id: Option<String>,
    pub account_id: Option<String>,
    /// Columns outside the fixed schema, passed through verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ActivityRecord {
    /// Type name for reports, empty when unknown
    pub fn kind_label(&self) -> String {
        self.kind.map(|k| k.to_string()).unwrap_or_default()
    }
}

/// A single validation finding; one line may carry several
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub line: usize,
    pub message: String,
}

impl ValidationError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Linha {}: {}", self.line, self.message)
    }
}
