//! Semantic validation of parsed rows
//!
//! Every check on a row runs; findings accumulate so the operator sees all
//! problems of a line at once. A row is promoted to an [`ActivityRecord`]
//! only when it has no finding, and one row's outcome never affects
//! another's.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ImportConfig;
use crate::models::{ActivityRecord, ImportMode, RawRow, ValidationError, WorkItemType};
use crate::schema::{self, CANONICAL_FIELDS, MAX_TITLE_CHARS, UPDATE_REQUIRED, VOCABULARIES};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email validation pattern to compile")
});

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date validation pattern to compile")
});

/// What the validator needs to know besides the rows themselves
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub mode: ImportMode,
    pub enabled_types: Vec<WorkItemType>,
    /// Known responsible-party names; empty disables the directory check
    pub roster: Vec<String>,
}

impl ValidationContext {
    pub fn new(mode: ImportMode, config: &ImportConfig) -> Self {
        Self {
            mode,
            enabled_types: config.enabled_types.clone(),
            roster: config.roster.clone(),
        }
    }
}

/// Validator output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid_activities: Vec<ActivityRecord>,
    pub errors: Vec<ValidationError>,
}

impl ValidationOutcome {
    /// Source lines that produced at least one finding
    pub fn rejected_lines(&self) -> Vec<usize> {
        let mut lines: Vec<usize> = self.errors.iter().map(|e| e.line).collect();
        lines.dedup();
        lines
    }
}

/// Validate all rows
pub fn validate(rows: &[RawRow], ctx: &ValidationContext) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for row in rows {
        let findings = match ctx.mode {
            ImportMode::Update => check_update_row(row),
            ImportMode::Create => check_create_row(row, ctx),
        };

        if findings.is_empty() {
            outcome.valid_activities.push(project(row));
        } else {
            debug!(line = row.original_line, findings = findings.len(), "Row rejected");
            outcome.errors.extend(
                findings
                    .into_iter()
                    .map(|message| ValidationError::new(row.original_line, message)),
            );
        }
    }

    debug!(
        valid = outcome.valid_activities.len(),
        errors = outcome.errors.len(),
        "Validation finished"
    );
    outcome
}

fn check_update_row(row: &RawRow) -> Vec<String> {
    UPDATE_REQUIRED
        .iter()
        .filter(|field| row.value(field).is_none())
        .map(|field| format!("Campo '{}' obrigatório no modo de atualização", field))
        .collect()
}

fn check_create_row(row: &RawRow, ctx: &ValidationContext) -> Vec<String> {
    let mut findings = Vec::new();

    // Universal
    let kind = match row.value(schema::TIPO) {
        None => {
            findings.push("Tipo obrigatório".to_string());
            None
        }
        Some(text) => match text.parse::<WorkItemType>() {
            Ok(kind) if ctx.enabled_types.contains(&kind) => Some(kind),
            _ => {
                findings.push(format!(
                    "Tipo '{}' não permitido. Valores aceitos: {}",
                    text,
                    join(ctx.enabled_types.iter().map(|k| k.as_str()))
                ));
                None
            }
        },
    };

    match row.value(schema::TITULO) {
        None => findings.push("Título obrigatório".to_string()),
        Some(title) if title.chars().count() > MAX_TITLE_CHARS => findings.push(format!(
            "Título excede {} caracteres",
            MAX_TITLE_CHARS
        )),
        Some(_) => {}
    }

    // Type-conditional
    if let Some(kind) = kind {
        for field in schema::required_fields(kind) {
            if row.value(field).is_none() {
                findings.push(format!("Campo '{}' obrigatório para o tipo {}", field, kind));
            }
        }
    }

    // Enumerated
    for vocabulary in &VOCABULARIES {
        if let Some(value) = row.value(vocabulary.field) {
            if !vocabulary.allows(value) {
                findings.push(format!(
                    "Valor '{}' inválido para '{}'. Valores permitidos: {}",
                    value,
                    vocabulary.field,
                    join(vocabulary.values.iter().copied())
                ));
            }
        }
    }

    // Hierarchical
    let category = row.value(schema::CATEGORIA);
    let sub_category = row.value(schema::SUBCATEGORIA);
    match (category, sub_category) {
        (Some(category), sub) => match schema::subcategories(category) {
            None => findings.push(format!(
                "Categoria '{}' inválida. Valores permitidos: {}",
                category,
                join(schema::category_names().into_iter())
            )),
            Some(children) => {
                if let Some(sub) = sub {
                    if !children.contains(&sub) {
                        findings.push(format!(
                            "Subcategoria '{}' não pertence à categoria '{}'. Valores permitidos: {}",
                            sub,
                            category,
                            join(children.iter().copied())
                        ));
                    }
                }
            }
        },
        (None, Some(sub)) => {
            findings.push(format!("Subcategoria '{}' informada sem categoria", sub))
        }
        (None, None) => {}
    }

    // Directory
    if let Some(name) = row.value(schema::RESPONSAVEL) {
        if !ctx.roster.is_empty()
            && !ctx
                .roster
                .iter()
                .any(|known| known.trim().to_lowercase() == name.to_lowercase())
        {
            findings.push(format!("Responsável '{}' não encontrado", name));
        }
    }

    // Format
    if let Some(email) = row.value(schema::EMAIL) {
        if !EMAIL_PATTERN.is_match(email) {
            findings.push(format!("E-mail inválido: {}", email));
        }
    }

    for field in [schema::ID_TICKET, schema::ID_ORGANIZACAO] {
        if let Some(value) = row.value(field) {
            if value.parse::<i64>().is_err() {
                findings.push(format!(
                    "Campo '{}' deve ser um número inteiro: {}",
                    field, value
                ));
            }
        }
    }

    if let Some(value) = row.value(schema::ESFORCO_ESTIMADO) {
        if parse_effort(value).is_none() {
            findings.push(format!(
                "Campo '{}' deve ser um número não negativo: {}",
                schema::ESFORCO_ESTIMADO,
                value
            ));
        }
    }

    let mut dates = [None, None];
    for (slot, field) in [schema::DATA_INICIO, schema::DATA_FIM].into_iter().enumerate() {
        if let Some(value) = row.value(field) {
            match parse_date(value) {
                Some(date) => dates[slot] = Some(date),
                None => findings.push(format!(
                    "Data inválida em '{}': {} (formato AAAA-MM-DD)",
                    field, value
                )),
            }
        }
    }
    if let [Some(start), Some(end)] = dates {
        if end < start {
            findings.push(format!(
                "Data fim ({}) anterior à data início ({})",
                end, start
            ));
        }
    }

    findings
}

fn join<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(", ")
}

/// Non-negative finite number; a decimal comma is accepted
fn parse_effort(value: &str) -> Option<f64> {
    value
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
}

/// `YYYY-MM-DD` that names a real calendar day
fn parse_date(value: &str) -> Option<NaiveDate> {
    if !DATE_PATTERN.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Typed projection of a row
///
/// Values that do not parse are left out; in create mode they have already
/// been rejected, in update mode they are not checked.
fn project(row: &RawRow) -> ActivityRecord {
    let text = |field: &str| row.value(field).map(str::to_string);

    let extra: BTreeMap<String, String> = row
        .fields
        .iter()
        .filter(|(name, _)| !CANONICAL_FIELDS.contains(&name.as_str()))
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(name, value)| (name.clone(), value.trim().to_string()))
        .collect();

    ActivityRecord {
        original_line: row.original_line,
        kind: row
            .value(schema::TIPO)
            .and_then(|t| t.parse::<WorkItemType>().ok()),
        title: text(schema::TITULO).unwrap_or_default(),
        description: text(schema::DESCRICAO),
        category: text(schema::CATEGORIA),
        sub_category: text(schema::SUBCATEGORIA),
        urgency: text(schema::URGENCIA),
        platform: text(schema::PLATAFORMA),
        client_type: text(schema::TIPO_CLIENTE),
        criticality: text(schema::CRITICIDADE),
        localization_difficulty: text(schema::DIFICULDADE_LOCALIZACAO),
        root_cause: text(schema::CAUSA_RAIZ),
        warranty: text(schema::GARANTIA),
        ticket_id: row.value(schema::ID_TICKET).and_then(|v| v.parse().ok()),
        organization_id: row
            .value(schema::ID_ORGANIZACAO)
            .and_then(|v| v.parse().ok()),
        responsible: text(schema::RESPONSAVEL),
        email: text(schema::EMAIL),
        estimated_effort: row.value(schema::ESFORCO_ESTIMADO).and_then(parse_effort),
        start_date: row.value(schema::DATA_INICIO).and_then(parse_date),
        end_date: row.value(schema::DATA_FIM).and_then(parse_date),
        remote_id: text(schema::ID_ATIVIDADE),
        account_id: text(schema::ID_CONTA),
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn ctx() -> ValidationContext {
        ValidationContext {
            mode: ImportMode::Create,
            enabled_types: WorkItemType::ALL.to_vec(),
            roster: vec!["Ana Souza".to_string(), "Bruno Lima".to_string()],
        }
    }

    fn run(content: &str, ctx: &ValidationContext) -> ValidationOutcome {
        let parsed = parse(content);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        validate(&parsed.rows, ctx)
    }

    fn messages(outcome: &ValidationOutcome) -> Vec<String> {
        outcome.errors.iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_minimal_deploy_is_valid() {
        let outcome = run("tipo,titulo\nDeploy,Release 1.0\n", &ctx());

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.valid_activities.len(), 1);
        let record = &outcome.valid_activities[0];
        assert_eq!(record.kind, Some(WorkItemType::Deploy));
        assert_eq!(record.title, "Release 1.0");
        assert_eq!(record.original_line, 2);
    }

    #[test]
    fn test_missing_conditional_field_names_field_and_type() {
        let outcome = run(
            "tipo,titulo,categoria,subcategoria,tipo_cliente\n\
             Melhoria,Nova tela,Técnico,Performance,\n",
            &ctx(),
        );

        assert!(outcome.valid_activities.is_empty());
        assert_eq!(
            messages(&outcome),
            vec!["Campo 'tipo_cliente' obrigatório para o tipo Melhoria".to_string()]
        );
        assert_eq!(outcome.errors[0].to_string(), "Linha 2: Campo 'tipo_cliente' obrigatório para o tipo Melhoria");
    }

    #[test]
    fn test_subcategory_from_other_category_rejected() {
        let outcome = run(
            "tipo,titulo,categoria,subcategoria,tipo_cliente\n\
             Melhoria,X,Financeiro,Performance,Interno\n",
            &ctx(),
        );

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0]
            .message
            .starts_with("Subcategoria 'Performance' não pertence à categoria 'Financeiro'"));
    }

    #[test]
    fn test_findings_accumulate_on_one_row() {
        let outcome = run(
            "tipo,titulo,urgencia,email,id_ticket,esforco_estimado\n\
             Tarefa,,Urgente,nao-e-email,12a,-3\n",
            &ctx(),
        );

        assert!(outcome.valid_activities.is_empty());
        assert_eq!(outcome.errors.len(), 5);
        assert!(outcome.errors.iter().all(|e| e.line == 2));
        let all = messages(&outcome);
        assert!(all.contains(&"Título obrigatório".to_string()));
        assert!(all
            .iter()
            .any(|m| m.contains("Valores permitidos: Baixa, Média, Alta, Crítica")));
    }

    #[test]
    fn test_rows_are_independent() {
        let outcome = run(
            "tipo,titulo\nTarefa,A\nEpic,B\nTarefa,C\n",
            &ctx(),
        );

        let lines: Vec<usize> = outcome
            .valid_activities
            .iter()
            .map(|r| r.original_line)
            .collect();
        assert_eq!(lines, vec![2, 4]);
        assert_eq!(outcome.rejected_lines(), vec![3]);
    }

    #[test]
    fn test_disabled_type_rejected() {
        let mut context = ctx();
        context.enabled_types = vec![WorkItemType::Tarefa];
        let outcome = run("tipo,titulo\nDeploy,R\n", &context);

        assert_eq!(
            messages(&outcome),
            vec!["Tipo 'Deploy' não permitido. Valores aceitos: Tarefa".to_string()]
        );
    }

    #[test]
    fn test_title_length_limit() {
        let long = "é".repeat(MAX_TITLE_CHARS + 1);
        let ok = "é".repeat(MAX_TITLE_CHARS);
        let outcome = run(&format!("tipo,titulo\nTarefa,{}\nTarefa,{}\n", long, ok), &ctx());

        assert_eq!(outcome.rejected_lines(), vec![2]);
        assert_eq!(outcome.valid_activities.len(), 1);
    }

    #[test]
    fn test_roster_is_case_insensitive() {
        let outcome = run(
            "tipo,titulo,responsavel\nTarefa,A,ana souza\nTarefa,B,Carla\n",
            &ctx(),
        );

        assert_eq!(outcome.valid_activities.len(), 1);
        assert_eq!(
            messages(&outcome),
            vec!["Responsável 'Carla' não encontrado".to_string()]
        );
    }

    #[test]
    fn test_dates_must_be_real_and_ordered() {
        let outcome = run(
            "tipo,titulo,data_inicio,data_fim\n\
             Tarefa,A,2024-02-30,\n\
             Tarefa,B,2024-3-01,\n\
             Tarefa,C,2024-05-10,2024-05-01\n\
             Tarefa,D,2024-02-29,2024-03-01\n",
            &ctx(),
        );

        assert_eq!(outcome.rejected_lines(), vec![2, 3, 4]);
        let record = &outcome.valid_activities[0];
        assert_eq!(record.start_date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(record.end_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_valid_incident_projection() {
        let outcome = run(
            "tipo,titulo,categoria,subcategoria,urgencia,criticidade,id_ticket,esforco_estimado,Centro de Custo\n\
             Incidente,Queda,Técnico,Segurança,Alta,Média,4512,\"2,5\",CC-1\n",
            &ctx(),
        );

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let record = &outcome.valid_activities[0];
        assert_eq!(record.ticket_id, Some(4512));
        assert_eq!(record.estimated_effort, Some(2.5));
        assert_eq!(record.sub_category.as_deref(), Some("Segurança"));
        assert_eq!(record.extra.get("Centro de Custo").map(String::as_str), Some("CC-1"));
    }

    #[test]
    fn test_update_mode_only_checks_identifiers() {
        let mut context = ctx();
        context.mode = ImportMode::Update;
        let outcome = run(
            "id_atividade,titulo,id_conta,tipo,urgencia\n\
             A-1,Renomeada,77,Incidente,Qualquer\n\
             ,Sem id,77,,\n",
            &context,
        );

        assert_eq!(outcome.valid_activities.len(), 1);
        assert_eq!(outcome.valid_activities[0].remote_id.as_deref(), Some("A-1"));
        assert_eq!(
            messages(&outcome),
            vec!["Campo 'id_atividade' obrigatório no modo de atualização".to_string()]
        );
    }
}
