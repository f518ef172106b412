//! Stream identifiers and the structured stream sub-query used by `_stream:{...}`.

use std::fmt;

use crate::filter::quote_token_if_needed;

/// Tenant scope of a log stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId {
    pub account_id: u32,
    pub project_id: u32,
}

/// Identifier of a log stream. Every block belongs to exactly one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId {
    pub tenant_id: TenantId,
    pub id: u128,
}

/// Comparison operator of a stream tag filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTagOp {
    Equal,
    NotEqual,
    Regexp,
    NotRegexp,
}

impl StreamTagOp {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamTagOp::Equal => "=",
            StreamTagOp::NotEqual => "!=",
            StreamTagOp::Regexp => "=~",
            StreamTagOp::NotRegexp => "!~",
        }
    }
}

/// `label op "value"` inside a stream selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTagFilter {
    pub tag_name: String,
    pub op: StreamTagOp,
    pub value: String,
}

impl fmt::Display for StreamTagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            quote_token_if_needed(&self.tag_name),
            self.op.as_str(),
            crate::filter::quote_string(&self.value)
        )
    }
}

/// Stream selector: an OR of AND-groups of tag filters.
///
/// Resolving it into concrete stream ids is the job of a [`StreamIndex`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFilter {
    pub or_filters: Vec<Vec<StreamTagFilter>>,
}

impl StreamFilter {
    pub fn new(or_filters: Vec<Vec<StreamTagFilter>>) -> Self {
        StreamFilter { or_filters }
    }

    /// An empty selector matches every stream.
    pub fn is_empty(&self) -> bool {
        self.or_filters.iter().all(|and| and.is_empty())
    }
}

impl fmt::Display for StreamFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, and) in self.or_filters.iter().enumerate() {
            if i > 0 {
                f.write_str(" or ")?;
            }
            for (j, tf) in and.iter().enumerate() {
                if j > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", tf)?;
            }
        }
        f.write_str("}")
    }
}

/// Index lookup collaborator resolving stream selectors.
pub trait StreamIndex: Send + Sync {
    fn search_stream_ids(&self, tenant_ids: &[TenantId], filter: &StreamFilter) -> Vec<StreamId>;
}
