//! Delimited result report
//!
//! Same layout for a fresh import and for a history redownload. Rows are
//! ordered by source line.

use crate::error::ImportError;
use crate::models::ImportResult;

pub const REPORT_HEADERS: [&str; 7] = [
    "id_remoto",
    "uid_remoto",
    "linha",
    "titulo",
    "tipo",
    "status",
    "mensagem_erro",
];

pub const STATUS_SUCCESS: &str = "sucesso";
pub const STATUS_ERROR: &str = "erro";

/// Render a result as comma-separated text with a header row
pub fn write_report(result: &ImportResult) -> Result<String, ImportError> {
    let mut rows: Vec<(usize, [String; 7])> = Vec::with_capacity(result.total);

    for s in &result.success {
        rows.push((
            s.line,
            [
                s.remote_id.clone(),
                s.remote_uid.clone(),
                s.line.to_string(),
                s.title.clone(),
                s.kind.clone(),
                STATUS_SUCCESS.to_string(),
                String::new(),
            ],
        ));
    }
    for e in &result.errors {
        rows.push((
            e.line,
            [
                String::new(),
                String::new(),
                e.line.to_string(),
                e.title.clone(),
                e.kind.clone(),
                STATUS_ERROR.to_string(),
                e.message.clone(),
            ],
        ));
    }
    rows.sort_by_key(|(line, _)| *line);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADERS)?;
    for (_, row) in &rows {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Report(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ImportError::Report(e.to_string()))
}

/// Default report file name for an import
pub fn report_file_name(import_name: &str) -> String {
    let stem: String = import_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("relatorio_{}.csv", stem)
}
