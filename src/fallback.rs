//! Read policies for the public site: a missing row or an unreachable
//! database must never blank a page.

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::sections::Section;
use crate::store::StoreResult;

/// Serves the stored section row, or the section's literal defaults when
/// there is no row yet or the store failed.
#[derive(Debug, Clone, Copy)]
pub struct WithDefaultFallback {
    section: &'static str,
    defaults: fn() -> Value,
}

impl WithDefaultFallback {
    pub fn new(section: &'static str, defaults: fn() -> Value) -> Self {
        Self { section, defaults }
    }

    pub fn for_section<T: Section>() -> Self {
        Self::new(T::NAME, T::defaults)
    }

    pub fn resolve<T: Serialize>(&self, outcome: StoreResult<Option<T>>) -> Value {
        match outcome {
            Ok(Some(row)) => serde_json::to_value(row).unwrap_or_else(|e| {
                warn!("Could not encode {} section, serving defaults: {}", self.section, e);
                (self.defaults)()
            }),
            Ok(None) => {
                debug!("No {} section stored yet, serving defaults", self.section);
                (self.defaults)()
            }
            Err(e) => {
                warn!("Reading {} section failed, serving defaults: {}", self.section, e);
                (self.defaults)()
            }
        }
    }
}

/// List counterpart: a failed read becomes an empty list.
pub fn or_empty<T>(what: &str, outcome: StoreResult<Vec<T>>) -> Vec<T> {
    outcome.unwrap_or_else(|e| {
        warn!("Listing {} failed, serving an empty list: {}", what, e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::About;
    use crate::store::StoreError;
    use serde_json::json;

    #[test]
    fn empty_table_serves_literal_defaults() {
        let policy = WithDefaultFallback::for_section::<About>();
        let value = policy.resolve::<About>(Ok(None));
        assert_eq!(value, About::defaults());
        assert_eq!(value["id"], "default");
    }

    #[test]
    fn store_errors_serve_defaults_too() {
        let policy = WithDefaultFallback::for_section::<About>();
        let value = policy.resolve::<About>(Err(StoreError::Backend("connection refused".into())));
        assert_eq!(value["title"], "About Us");
    }

    #[test]
    fn stored_rows_win() {
        let policy = WithDefaultFallback::for_section::<About>();
        let row = About {
            id: 3,
            title: "Tentang Kami".into(),
            ..About::default()
        };
        let value = policy.resolve(Ok(Some(row)));
        assert_eq!(value["id"], json!(3));
        assert_eq!(value["title"], "Tentang Kami");
    }

    #[test]
    fn failed_lists_are_empty() {
        let rows: Vec<i32> = or_empty("benefits", Err(StoreError::NotFound));
        assert!(rows.is_empty());
        assert_eq!(or_empty("benefits", Ok(vec![1, 2])), vec![1, 2]);
    }
}
