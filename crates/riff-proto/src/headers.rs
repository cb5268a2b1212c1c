//! Immutable, case-insensitive, multi-valued header map.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::HeaderError;
use crate::value::IntoHeaderValue;

/// An immutable map from header names to ordered lists of string values.
///
/// Names are matched case-insensitively: `Accept` and `accept` address the
/// same slot. The casing used on first insertion is kept as the slot's
/// canonical name and is what [`to_wire_form`](Self::to_wire_form) emits.
///
/// Every operation that changes content returns a new map and leaves the
/// receiver untouched. Clones share storage until one of them is derived
/// from, so holding on to an old map is cheap and safe across threads.
///
/// ```
/// use riff_proto::HeaderMap;
///
/// let headers = HeaderMap::new()
///     .add_header("Accept", ["text/plain"])?
///     .add_header("accept", ["application/json"])?;
///
/// assert_eq!(headers.get_value("ACCEPT"), Some("text/plain"));
/// assert_eq!(headers.get_values("accept").map(<[_]>::len), Some(2));
/// assert!(headers.to_wire_form().contains_key("Accept"));
/// # Ok::<(), riff_proto::HeaderError>(())
/// ```
#[derive(Clone, Default)]
pub struct HeaderMap {
    inner: Arc<Slots>,
}

#[derive(Clone, Debug, Default)]
struct Slots {
    /// Slots in first-insertion order.
    entries: Vec<Slot>,
    /// Normalized name to position in `entries`.
    index: HashMap<String, usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Slot {
    name: String,
    values: Vec<String>,
}

/// Case-folds a header name. Locale-independent.
fn normalize(name: &str) -> String {
    name.to_lowercase()
}

fn validate_name(name: &str) -> Result<(), HeaderError> {
    if name.is_empty() || name.chars().any(|c| c.is_ascii_control()) {
        return Err(HeaderError::InvalidHeaderName(name.to_owned()));
    }
    Ok(())
}

fn collect_values<I>(name: &str, values: I) -> Result<Vec<String>, HeaderError>
where
    I: IntoIterator,
    I::Item: IntoHeaderValue,
{
    let values: Vec<String> = values
        .into_iter()
        .map(IntoHeaderValue::into_header_value)
        .collect();
    if values.is_empty() {
        return Err(HeaderError::NoValues(name.to_owned()));
    }
    Ok(values)
}

impl HeaderMap {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a header map from its wire form.
    ///
    /// Entries are merged as if added one by one with
    /// [`add_header`](Self::add_header), so two wire keys that differ only in
    /// case end up in one slot. Entries without values are skipped.
    pub fn from_wire_form<I, K, V>(wire: I) -> Result<Self, HeaderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoIterator,
        V::Item: IntoHeaderValue,
    {
        let mut map = Self::new();
        for (name, values) in wire {
            let name = name.as_ref();
            validate_name(name)?;
            let values: Vec<String> = values
                .into_iter()
                .map(IntoHeaderValue::into_header_value)
                .collect();
            if values.is_empty() {
                continue;
            }
            map.append_in_place(name, values);
        }
        Ok(map)
    }

    /// Returns a new map with `values` appended to the slot for `name`.
    ///
    /// If no slot matches `name` case-insensitively, one is created and
    /// `name` becomes its canonical casing. Otherwise the existing casing is
    /// kept and the values are appended after the current ones.
    pub fn add_header<I>(&self, name: impl AsRef<str>, values: I) -> Result<Self, HeaderError>
    where
        I: IntoIterator,
        I::Item: IntoHeaderValue,
    {
        let name = name.as_ref();
        validate_name(name)?;
        let values = collect_values(name, values)?;

        let mut next = self.clone();
        next.append_in_place(name, values);
        Ok(next)
    }

    /// Returns a new map where the slot for `name` holds exactly `values`.
    ///
    /// Any previous values for the slot are discarded and its canonical
    /// casing becomes `name`. Other slots are untouched.
    pub fn replace_header<I>(&self, name: impl AsRef<str>, values: I) -> Result<Self, HeaderError>
    where
        I: IntoIterator,
        I::Item: IntoHeaderValue,
    {
        let name = name.as_ref();
        validate_name(name)?;
        let values = collect_values(name, values)?;

        let mut next = self.clone();
        let slots = Arc::make_mut(&mut next.inner);
        let slot = Slot {
            name: name.to_owned(),
            values,
        };
        match slots.index.get(&normalize(name)) {
            Some(&pos) => slots.entries[pos] = slot,
            None => slots.push(slot),
        }
        Ok(next)
    }

    /// Returns the first value for `name`, if the header is present.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<&str> {
        self.slot(name)
            .and_then(|slot| slot.values.first())
            .map(String::as_str)
    }

    /// Returns all values for `name` in insertion order, if present.
    #[must_use]
    pub fn get_values(&self, name: &str) -> Option<&[String]> {
        self.slot(name).map(|slot| slot.values.as_slice())
    }

    /// Returns the first value for `name`, failing if the header is absent.
    pub fn require_value(&self, name: &str) -> Result<&str, HeaderError> {
        self.get_value(name)
            .ok_or_else(|| HeaderError::MissingHeader(name.to_owned()))
    }

    /// Checks whether a slot exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Iterates over `(canonical name, values)` in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.inner
            .entries
            .iter()
            .map(|slot| (slot.name.as_str(), slot.values.as_slice()))
    }

    /// Converts to a plain mapping of canonical name to values.
    #[must_use]
    pub fn to_wire_form(&self) -> BTreeMap<String, Vec<String>> {
        self.inner
            .entries
            .iter()
            .map(|slot| (slot.name.clone(), slot.values.clone()))
            .collect()
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.inner
            .index
            .get(&normalize(name))
            .map(|&pos| &self.inner.entries[pos])
    }

    /// Appends to this map's own storage, copying it first if shared.
    fn append_in_place(&mut self, name: &str, values: Vec<String>) {
        let slots = Arc::make_mut(&mut self.inner);
        match slots.index.get(&normalize(name)) {
            Some(&pos) => slots.entries[pos].values.extend(values),
            None => slots.push(Slot {
                name: name.to_owned(),
                values,
            }),
        }
    }
}

impl Slots {
    fn push(&mut self, slot: Slot) {
        self.index.insert(normalize(&slot.name), self.entries.len());
        self.entries.push(slot);
    }
}

/// Structural equality: same canonical names with the same values in the
/// same order. The relative order of different names is not compared, since
/// the wire form does not preserve it.
impl PartialEq for HeaderMap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.len() == other.len()
                && self
                    .inner
                    .entries
                    .iter()
                    .all(|slot| other.slot(&slot.name) == Some(slot)))
    }
}

impl Eq for HeaderMap {}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map() {
        let map = HeaderMap::new();
        assert!(map.is_empty());
        assert_eq!(map.get_value("Accept"), None);
        assert_eq!(map.get_values("Accept"), None);
        assert!(map.to_wire_form().is_empty());
    }

    #[test]
    fn add_creates_slot_with_given_casing() {
        let map = HeaderMap::new()
            .add_header("Content-Type", ["text/plain"])
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.iter().next().unwrap().0, "Content-Type");
        assert!(map.contains("content-type"));
    }

    #[test]
    fn add_appends_to_existing_slot() {
        let map = HeaderMap::new()
            .add_header("X-Trace", ["a"])
            .unwrap()
            .add_header("x-trace", ["b", "c"])
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_values("X-TRACE").unwrap(), ["a", "b", "c"]);
        assert_eq!(map.iter().next().unwrap().0, "X-Trace");
    }

    #[test]
    fn replace_resets_values_and_casing() {
        let map = HeaderMap::new()
            .add_header("accept", ["a", "b"])
            .unwrap()
            .add_header("Other", ["o"])
            .unwrap()
            .replace_header("ACCEPT", ["z"])
            .unwrap();
        assert_eq!(map.get_values("accept").unwrap(), ["z"]);
        assert_eq!(map.to_wire_form().keys().collect::<Vec<_>>(), ["ACCEPT", "Other"]);
        assert_eq!(map.get_values("other").unwrap(), ["o"]);
    }

    #[test]
    fn replace_on_absent_name_inserts() {
        let map = HeaderMap::new().replace_header("X", [1]).unwrap();
        assert_eq!(map.get_value("x"), Some("1"));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let map = HeaderMap::new().add_header("A", ["1"]).unwrap();
        assert_eq!(
            map.add_header("", ["v"]),
            Err(HeaderError::InvalidHeaderName(String::new()))
        );
        assert!(matches!(
            map.replace_header("bad\r\nname", ["v"]),
            Err(HeaderError::InvalidHeaderName(_))
        ));
        assert_eq!(map.get_values("A").unwrap(), ["1"]);
    }

    #[test]
    fn empty_value_list_is_rejected() {
        let err = HeaderMap::new()
            .add_header("X", Vec::<String>::new())
            .unwrap_err();
        assert_eq!(err, HeaderError::NoValues("X".into()));
    }

    #[test]
    fn require_value_reports_missing() {
        let map = HeaderMap::new().add_header("Accept", ["*/*"]).unwrap();
        assert_eq!(map.require_value("accept"), Ok("*/*"));
        assert_eq!(
            map.require_value("Content-Type"),
            Err(HeaderError::MissingHeader("Content-Type".into()))
        );
    }

    #[test]
    fn derivation_leaves_receiver_untouched() {
        let base = HeaderMap::new().add_header("A", ["1"]).unwrap();
        let snapshot = base.clone();

        let _added = base.add_header("a", ["2"]).unwrap();
        let _replaced = base.replace_header("A", ["3"]).unwrap();
        let _other = base.add_header("B", ["4"]).unwrap();

        assert_eq!(base, snapshot);
        assert_eq!(base.get_values("A").unwrap(), ["1"]);
        assert!(!base.contains("B"));
    }

    #[test]
    fn from_wire_form_merges_case_variants() {
        let wire = vec![
            ("Accept".to_owned(), vec!["a".to_owned()]),
            ("ACCEPT".to_owned(), vec!["b".to_owned()]),
            ("Empty".to_owned(), vec![]),
        ];
        let map = HeaderMap::from_wire_form(wire).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_values("accept").unwrap(), ["a", "b"]);
        assert!(!map.contains("Empty"));
    }

    #[test]
    fn from_wire_form_rejects_empty_name() {
        let wire = [("", ["v"])];
        assert!(matches!(
            HeaderMap::from_wire_form(wire),
            Err(HeaderError::InvalidHeaderName(_))
        ));
    }

    #[test]
    fn equality_ignores_name_order() {
        let a = HeaderMap::new()
            .add_header("A", ["1"])
            .unwrap()
            .add_header("B", ["2"])
            .unwrap();
        let b = HeaderMap::new()
            .add_header("B", ["2"])
            .unwrap()
            .add_header("A", ["1"])
            .unwrap();
        assert_eq!(a, b);

        let c = HeaderMap::new()
            .add_header("a", ["1"])
            .unwrap()
            .add_header("B", ["2"])
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn unicode_names_fold_case() {
        let map = HeaderMap::new().add_header("X-Ärger", ["1"]).unwrap();
        assert_eq!(map.get_value("x-ärger"), Some("1"));
    }

    #[test]
    fn debug_lists_canonical_names() {
        let map = HeaderMap::new().add_header("Accept", ["a", "b"]).unwrap();
        assert_eq!(format!("{map:?}"), r#"{"Accept": ["a", "b"]}"#);
    }
}
