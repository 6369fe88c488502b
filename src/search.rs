//! Text search over fetched property collections.
//!
//! Pure derivation over an immutable snapshot, cheap enough to recompute
//! on every keystroke. The remote server offers the same matching through
//! its `?q=` parameter; this is the local equivalent for already-fetched
//! data.

use crate::model::Property;

/// Returns the subsequence of `properties` whose name, location, or
/// description contains `query`, case-insensitively.
///
/// An empty or whitespace-only query returns the input unchanged.
pub fn filter_properties<'a>(properties: &'a [Property], query: &str) -> Vec<&'a Property> {
  let query = query.trim();
  if query.is_empty() {
    return properties.iter().collect();
  }

  let needle = query.to_lowercase();
  properties
    .iter()
    .filter(|p| {
      p.name.to_lowercase().contains(&needle)
        || p.location.to_lowercase().contains(&needle)
        || p.description.to_lowercase().contains(&needle)
    })
    .collect()
}
