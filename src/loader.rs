use crate::error::{ReportError, Result};
use crate::util::{is_null_token, NULL_TOKENS};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Read a CSV file into a [`DataFrame`].
///
/// Column types are inferred from every row. Any read failure is fatal: a
/// missing or empty file, a CSV syntax error, or a row with more fields than
/// the header. Rows with fewer fields are padded with nulls.
pub fn load_records(path: &Path) -> Result<DataFrame> {
    let meta = std::fs::metadata(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() == 0 {
        return Err(ReportError::EmptyInput(path.to_path_buf()));
    }

    let null_values = NullValues::AllColumns(NULL_TOKENS.iter().map(|t| (*t).into()).collect());
    let read_err = |source: PolarsError| ReportError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(null_values)),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(read_err)?;

    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(ReportError::EmptyInput(path.to_path_buf()));
    }
    df.set_column_names(headers.iter().map(String::as_str))?;
    blank_text_to_null(&mut df)?;

    for col in df.get_columns() {
        debug!(column = %col.name(), dtype = %col.dtype(), "inferred column type");
    }
    info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded CSV"
    );
    Ok(df)
}

/// Whitespace-only cells and padded null tokens survive the reader as text.
fn blank_text_to_null(df: &mut DataFrame) -> Result<()> {
    let text_columns: Vec<PlSmallStr> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype().is_string())
        .map(|c| c.name().clone())
        .collect();
    for name in text_columns {
        let cleaned: StringChunked = df
            .column(name.as_str())?
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| v.filter(|s| !is_null_token(s)))
            .collect();
        df.replace(name.as_str(), cleaned.with_name(name.clone()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn infers_column_types() {
        let file = write_csv("id,price,flag,name\n1,10,true,a\n2,2.5,false,b\n3,,true,\n");
        let df = load_records(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("price").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("flag").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(df.column("name").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("price").unwrap().null_count(), 1);
        assert_eq!(df.column("name").unwrap().null_count(), 1);
    }

    #[test]
    fn headers_are_trimmed_and_tokens_are_null() {
        let file = write_csv(" product , note\nA,N/A\nB,  \nC,ok\n");
        let df = load_records(file.path()).unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["product", "note"]);
        assert_eq!(df.column("note").unwrap().null_count(), 2);
    }

    #[test]
    fn mixed_numbers_and_words_stay_text() {
        let file = write_csv("quantity\n2\ntwo\n");
        let df = load_records(file.path()).unwrap();
        assert_eq!(df.column("quantity").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn short_rows_are_padded() {
        let file = write_csv("a,b,c\n1,2\n");
        let df = load_records(file.path()).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("c").unwrap().null_count(), 1);
    }

    #[test]
    fn long_rows_are_fatal() {
        let file = write_csv("a,b\n1,2,3\n");
        let err = load_records(file.path()).unwrap_err();
        assert!(matches!(err, ReportError::Read { .. }));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load_records(Path::new("definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }));
    }

    #[test]
    fn empty_file_is_fatal() {
        let file = write_csv("");
        let err = load_records(file.path()).unwrap_err();
        assert!(matches!(err, ReportError::EmptyInput(_)));
    }
}
