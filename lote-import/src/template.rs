//! Import template generator
//!
//! Header cells are decorated with `*` (required for every type) or `**`
//! (required for some types). One example row is written per requested
//! type, followed by `#` comment rows describing each type's requirements
//! and the closed vocabularies. The parser skips comments and strips the
//! decorations, so a generated template imports as-is.

use crate::error::ImportError;
use crate::models::WorkItemType;
use crate::schema::{
    self, field_requirement, required_fields, FieldRequirement, CANONICAL_FIELDS, CATEGORIES,
    VOCABULARIES,
};

/// Header cell with its requirement marker
pub fn decorated_header(field: &str) -> String {
    match field_requirement(field) {
        FieldRequirement::Always => format!("{}*", field),
        FieldRequirement::SomeTypes => format!("{}**", field),
        FieldRequirement::Optional => field.to_string(),
    }
}

/// A valid sample value for a field
fn sample_value(field: &str, kind: WorkItemType) -> String {
    match field {
        schema::TIPO => kind.to_string(),
        schema::TITULO => format!("Exemplo de {}", kind),
        schema::DESCRICAO => format!("Descrição do item do tipo {}", kind),
        schema::CATEGORIA => "Técnico".to_string(),
        schema::SUBCATEGORIA => "Integração".to_string(),
        schema::URGENCIA => "Média".to_string(),
        schema::PLATAFORMA => "Web".to_string(),
        schema::TIPO_CLIENTE => "Interno".to_string(),
        schema::CRITICIDADE => "Alta".to_string(),
        schema::DIFICULDADE_LOCALIZACAO => "Média".to_string(),
        schema::CAUSA_RAIZ => "Código".to_string(),
        schema::GARANTIA => "Não".to_string(),
        schema::ID_TICKET => "1001".to_string(),
        schema::ID_ORGANIZACAO => "42".to_string(),
        _ => String::new(),
    }
}

fn example_row(kind: WorkItemType) -> Vec<String> {
    let required = required_fields(kind);
    CANONICAL_FIELDS
        .iter()
        .map(|field| {
            let shown = matches!(*field, schema::TIPO | schema::TITULO | schema::DESCRICAO)
                || required.contains(field)
                || (kind == WorkItemType::Deploy && *field == schema::PLATAFORMA);
            if shown {
                sample_value(field, kind)
            } else {
                String::new()
            }
        })
        .collect()
}

fn comment_rows(types: &[WorkItemType]) -> Vec<String> {
    let mut rows = vec![
        "# * obrigatório para todos os tipos".to_string(),
        "# ** obrigatório para alguns tipos (ver abaixo)".to_string(),
    ];

    for kind in types {
        let required = required_fields(*kind);
        if required.is_empty() {
            rows.push(format!("# {}: sem campos adicionais obrigatórios", kind));
        } else {
            rows.push(format!("# {}: {}", kind, required.join("; ")));
        }
    }

    for vocabulary in &VOCABULARIES {
        rows.push(format!(
            "# {} aceita: {}",
            vocabulary.field,
            vocabulary.values.join(" | ")
        ));
    }
    for (category, children) in &CATEGORIES {
        rows.push(format!(
            "# categoria {} aceita subcategoria: {}",
            category,
            children.join(" | ")
        ));
    }
    rows.push("# datas no formato AAAA-MM-DD".to_string());
    rows
}

/// Build a template for the given types; an empty slice means every type
pub fn generate_template(types: &[WorkItemType]) -> Result<String, ImportError> {
    let types: Vec<WorkItemType> = if types.is_empty() {
        WorkItemType::ALL.to_vec()
    } else {
        types.to_vec()
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CANONICAL_FIELDS.iter().map(|f| decorated_header(f)))?;
    for kind in &types {
        writer.write_record(example_row(*kind))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Report(e.to_string()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| ImportError::Report(e.to_string()))?;

    for row in comment_rows(&types) {
        text.push_str(&row);
        text.push('\n');
    }
    Ok(text)
}
