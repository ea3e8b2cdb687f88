use crate::intake::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::BTreeMap;

pub const DEFAULT_TABLE: &str = "combined_students_table";

/// One intake form, as described in the configuration.
///
/// All the fields are optional when parsing, so that one incomplete entry
/// only disables its own source.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceDescriptor {
    pub name: Option<String>,
    /// `xlsx` (default) or `csv`
    pub provider: Option<String>,
    pub spreadsheet: Option<String>,
    pub worksheet: Option<String>,
    #[serde(rename = "uniqueField")]
    pub unique_field: Option<String>,
    #[serde(rename = "headerRow")]
    pub _header_row: Option<JSValue>,
    #[serde(rename = "dataRow")]
    pub _data_row: Option<JSValue>,
}

impl SourceDescriptor {
    /// The name of the source, or its position in the list if it has none.
    pub fn label(&self, idx: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("#{}", idx + 1))
    }

    pub fn name(&self, idx: usize) -> IntakeResult<String> {
        self.required(idx, &self.name, "name")
    }

    pub fn provider(&self) -> String {
        self.provider.clone().unwrap_or_else(|| "xlsx".to_string())
    }

    pub fn spreadsheet(&self, idx: usize) -> IntakeResult<String> {
        self.required(idx, &self.spreadsheet, "spreadsheet")
    }

    pub fn worksheet(&self, idx: usize) -> IntakeResult<String> {
        self.required(idx, &self.worksheet, "worksheet")
    }

    pub fn unique_field(&self, idx: usize) -> IntakeResult<String> {
        self.required(idx, &self.unique_field, "uniqueField")
    }

    /// 0-based, defaults to 1 (the second row).
    pub fn header_row(&self) -> IntakeResult<usize> {
        match &self._header_row {
            None => Ok(1),
            x => read_js_int(x),
        }
    }

    /// 0-based, defaults to 2 (the third row).
    pub fn data_row(&self) -> IntakeResult<usize> {
        match &self._data_row {
            None => Ok(2),
            x => read_js_int(x),
        }
    }

    fn required(&self, idx: usize, field: &Option<String>, key: &str) -> IntakeResult<String> {
        match field {
            Some(s) if !s.trim().is_empty() => Ok(s.clone()),
            _ => MissingSourceKeySnafu {
                source_name: self.label(idx),
                key,
            }
            .fail(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseSettings {
    pub path: Option<String>,
    pub table: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "csvPath")]
    pub csv_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// In merge priority order.
    pub sources: Vec<SourceDescriptor>,
    pub database: Option<DatabaseSettings>,
    pub output: Option<OutputSettings>,
    /// Extra header aliases, on top of the built-in ones.
    pub aliases: Option<BTreeMap<String, String>>,
}

impl IntakeConfig {
    pub fn table_name(&self) -> String {
        self.database
            .as_ref()
            .and_then(|db| db.table.clone())
            .unwrap_or_else(|| DEFAULT_TABLE.to_string())
    }

    pub fn database_path(&self) -> Option<String> {
        self.database.as_ref().and_then(|db| db.path.clone())
    }

    pub fn csv_path(&self) -> Option<String> {
        self.output.as_ref().and_then(|o| o.csv_path.clone())
    }

    /// The applicant schema, with the aliases of the configuration added.
    pub fn schema(&self) -> Schema {
        let mut schema = Schema::applicant();
        if let Some(aliases) = &self.aliases {
            for (token, canonical) in aliases.iter() {
                schema.aliases.insert(&normalize_header(token), canonical);
            }
        }
        schema
    }
}

pub fn read_config(path: &str) -> IntakeResult<IntakeConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: content: {:?}", contents);
    let config: IntakeConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

fn read_js_int(x: &Option<JSValue>) -> IntakeResult<usize> {
    match x {
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| x as usize)
            .context(ParsingJsonNumberSnafu {}),
        Some(JSValue::String(s)) => s.trim().parse::<usize>().ok().context(ParsingJsonNumberSnafu {}),
        _ => None.context(ParsingJsonNumberSnafu {}),
    }
}
