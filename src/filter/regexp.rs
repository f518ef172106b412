use std::fmt;

use regex::Regex;

use crate::bitmap::Bitmap;
use crate::block::BlockSearch;
use crate::error::Result;
use crate::values::ValueType;

use super::{match_values_dict, quote_field_name_if_needed, quote_string, visit_rendered_values, visit_strings};

/// `field:re("pattern")`: the field value matches a regular expression.
///
/// The pattern is unanchored; numeric values are matched in their canonical
/// string form.
#[derive(Debug)]
pub struct RegexpFilter {
    field_name: String,
    re: Regex,
}

impl RegexpFilter {
    pub fn new(field_name: impl Into<String>, re: Regex) -> Self {
        RegexpFilter {
            field_name: field_name.into(),
            re,
        }
    }

    /// Compile `pattern` and build the filter.
    pub fn from_pattern(field_name: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(RegexpFilter::new(field_name, Regex::new(pattern)?))
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let re = &self.re;

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !re.is_match(v) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                if !re.is_match("") {
                    bm.reset_bits();
                }
                return;
            }
        };

        match ch.value_type {
            ValueType::String => visit_strings(bs, ch, bm, |v| re.is_match(v)),
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| re.is_match(v)),
            _ => visit_rendered_values(bs, ch, bm, |v| re.is_match(v)),
        }
    }
}

impl fmt::Display for RegexpFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}re({})",
            quote_field_name_if_needed(&self.field_name),
            quote_string(self.re.as_str())
        )
    }
}
