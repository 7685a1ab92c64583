//! Fixed field schema for work-item import files
//!
//! Canonical field names, header aliases, per-type required fields, closed
//! vocabularies and the category → sub-category hierarchy. Everything here
//! is known ahead of time; nothing is discovered from the input.

use crate::models::WorkItemType;

pub const TIPO: &str = "tipo";
pub const TITULO: &str = "titulo";
pub const DESCRICAO: &str = "descricao";
pub const CATEGORIA: &str = "categoria";
pub const SUBCATEGORIA: &str = "subcategoria";
pub const URGENCIA: &str = "urgencia";
pub const PLATAFORMA: &str = "plataforma";
pub const TIPO_CLIENTE: &str = "tipo_cliente";
pub const CRITICIDADE: &str = "criticidade";
pub const DIFICULDADE_LOCALIZACAO: &str = "dificuldade_localizacao";
pub const CAUSA_RAIZ: &str = "causa_raiz";
pub const GARANTIA: &str = "garantia";
pub const ID_TICKET: &str = "id_ticket";
pub const ID_ORGANIZACAO: &str = "id_organizacao";
pub const RESPONSAVEL: &str = "responsavel";
pub const EMAIL: &str = "email";
pub const ESFORCO_ESTIMADO: &str = "esforco_estimado";
pub const DATA_INICIO: &str = "data_inicio";
pub const DATA_FIM: &str = "data_fim";
pub const ID_ATIVIDADE: &str = "id_atividade";
pub const ID_CONTA: &str = "id_conta";

/// Headers without which a file cannot be parsed
pub const MANDATORY_HEADERS: [&str; 2] = [TIPO, TITULO];

/// Fields required in update mode (all other checks are skipped)
pub const UPDATE_REQUIRED: [&str; 3] = [ID_ATIVIDADE, TITULO, ID_CONTA];

/// Maximum title length in characters
pub const MAX_TITLE_CHARS: usize = 255;

/// All canonical fields, in template column order
pub const CANONICAL_FIELDS: [&str; 21] = [
    TIPO,
    TITULO,
    DESCRICAO,
    CATEGORIA,
    SUBCATEGORIA,
    URGENCIA,
    PLATAFORMA,
    TIPO_CLIENTE,
    CRITICIDADE,
    DIFICULDADE_LOCALIZACAO,
    CAUSA_RAIZ,
    GARANTIA,
    ID_TICKET,
    ID_ORGANIZACAO,
    RESPONSAVEL,
    EMAIL,
    ESFORCO_ESTIMADO,
    DATA_INICIO,
    DATA_FIM,
    ID_ATIVIDADE,
    ID_CONTA,
];

/// Lowercased header text → canonical field name
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("tipo", TIPO),
    ("type", TIPO),
    ("titulo", TITULO),
    ("título", TITULO),
    ("title", TITULO),
    ("descricao", DESCRICAO),
    ("descrição", DESCRICAO),
    ("description", DESCRICAO),
    ("categoria", CATEGORIA),
    ("category", CATEGORIA),
    ("subcategoria", SUBCATEGORIA),
    ("sub-categoria", SUBCATEGORIA),
    ("sub_categoria", SUBCATEGORIA),
    ("subcategory", SUBCATEGORIA),
    ("urgencia", URGENCIA),
    ("urgência", URGENCIA),
    ("urgency", URGENCIA),
    ("plataforma", PLATAFORMA),
    ("platform", PLATAFORMA),
    ("tipo_cliente", TIPO_CLIENTE),
    ("tipo de cliente", TIPO_CLIENTE),
    ("client type", TIPO_CLIENTE),
    ("criticidade", CRITICIDADE),
    ("criticality", CRITICIDADE),
    ("dificuldade_localizacao", DIFICULDADE_LOCALIZACAO),
    ("dificuldade de localização", DIFICULDADE_LOCALIZACAO),
    ("dificuldade de localizacao", DIFICULDADE_LOCALIZACAO),
    ("causa_raiz", CAUSA_RAIZ),
    ("causa raiz", CAUSA_RAIZ),
    ("root cause", CAUSA_RAIZ),
    ("garantia", GARANTIA),
    ("warranty", GARANTIA),
    ("id_ticket", ID_TICKET),
    ("id ticket", ID_TICKET),
    ("ticket", ID_TICKET),
    ("ticket id", ID_TICKET),
    ("id_organizacao", ID_ORGANIZACAO),
    ("id organização", ID_ORGANIZACAO),
    ("id organizacao", ID_ORGANIZACAO),
    ("organization id", ID_ORGANIZACAO),
    ("responsavel", RESPONSAVEL),
    ("responsável", RESPONSAVEL),
    ("responsible", RESPONSAVEL),
    ("email", EMAIL),
    ("e-mail", EMAIL),
    ("esforco_estimado", ESFORCO_ESTIMADO),
    ("esforço estimado", ESFORCO_ESTIMADO),
    ("esforco estimado", ESFORCO_ESTIMADO),
    ("estimated effort", ESFORCO_ESTIMADO),
    ("data_inicio", DATA_INICIO),
    ("data início", DATA_INICIO),
    ("data inicio", DATA_INICIO),
    ("start date", DATA_INICIO),
    ("data_fim", DATA_FIM),
    ("data fim", DATA_FIM),
    ("end date", DATA_FIM),
    ("id_atividade", ID_ATIVIDADE),
    ("id atividade", ID_ATIVIDADE),
    ("activity id", ID_ATIVIDADE),
    ("id_conta", ID_CONTA),
    ("id conta", ID_CONTA),
    ("account id", ID_CONTA),
];

/// Map a header cell to its canonical field name
///
/// Matching ignores case, surrounding whitespace and trailing `*` markers
/// written by the template generator. Unrecognized headers come back
/// verbatim (trimmed only).
pub fn canonical_header(cell: &str) -> String {
    let trimmed = cell.trim();
    let key = trimmed.trim_end_matches('*').trim().to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Auxiliary fields a type cannot do without
pub fn required_fields(kind: WorkItemType) -> &'static [&'static str] {
    match kind {
        WorkItemType::Deploy => &[],
        WorkItemType::Incidente => &[CATEGORIA, SUBCATEGORIA, URGENCIA, CRITICIDADE, ID_TICKET],
        WorkItemType::Melhoria => &[CATEGORIA, SUBCATEGORIA, TIPO_CLIENTE],
        WorkItemType::Suporte => &[ID_TICKET, ID_ORGANIZACAO, TIPO_CLIENTE, URGENCIA],
        WorkItemType::Localizacao => &[DIFICULDADE_LOCALIZACAO],
        WorkItemType::Correcao => &[CAUSA_RAIZ, GARANTIA, CRITICIDADE],
        WorkItemType::Tarefa => &[],
    }
}

/// A field with a closed set of allowed values
#[derive(Debug, Clone, Copy)]
pub struct Vocabulary {
    pub field: &'static str,
    pub values: &'static [&'static str],
}

impl Vocabulary {
    pub fn allows(&self, value: &str) -> bool {
        self.values.contains(&value.trim())
    }
}

pub const VOCABULARIES: [Vocabulary; 7] = [
    Vocabulary {
        field: URGENCIA,
        values: &["Baixa", "Média", "Alta", "Crítica"],
    },
    Vocabulary {
        field: PLATAFORMA,
        values: &["Web", "Android", "iOS", "Desktop", "API"],
    },
    Vocabulary {
        field: TIPO_CLIENTE,
        values: &["Interno", "Externo", "Parceiro"],
    },
    Vocabulary {
        field: CRITICIDADE,
        values: &["Baixa", "Média", "Alta"],
    },
    Vocabulary {
        field: DIFICULDADE_LOCALIZACAO,
        values: &["Fácil", "Média", "Difícil"],
    },
    Vocabulary {
        field: CAUSA_RAIZ,
        values: &["Código", "Configuração", "Infraestrutura", "Dados", "Terceiros"],
    },
    Vocabulary {
        field: GARANTIA,
        values: &["Sim", "Não"],
    },
];

pub fn vocabulary(field: &str) -> Option<&'static Vocabulary> {
    VOCABULARIES.iter().find(|v| v.field == field)
}

/// Category → allowed sub-categories
pub const CATEGORIES: [(&str, &[&str]); 4] = [
    ("Financeiro", &["Faturamento", "Pagamentos", "Conciliação"]),
    ("Técnico", &["Integração", "Performance", "Segurança"]),
    ("Comercial", &["Contratos", "Propostas"]),
    ("Operacional", &["Logística", "Estoque"]),
];

pub fn category_names() -> Vec<&'static str> {
    CATEGORIES.iter().map(|(name, _)| *name).collect()
}

/// Allowed sub-categories of a category, `None` for an unknown category
pub fn subcategories(category: &str) -> Option<&'static [&'static str]> {
    let category = category.trim();
    CATEGORIES
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, children)| *children)
}

/// How the template decorates a column header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRequirement {
    /// Required for every type
    Always,
    /// Required for at least one type
    SomeTypes,
    Optional,
}

pub fn field_requirement(field: &str) -> FieldRequirement {
    if MANDATORY_HEADERS.contains(&field) {
        FieldRequirement::Always
    } else if WorkItemType::ALL
        .iter()
        .any(|kind| required_fields(*kind).contains(&field))
    {
        FieldRequirement::SomeTypes
    } else {
        FieldRequirement::Optional
    }
}
