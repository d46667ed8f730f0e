//! Entity codec
//!
//! Translates a [`Project`] to and from the flat string field map kept in a
//! key-value hash, and owns key derivation. Every key the store computes goes
//! through [`derive_key`].

use crate::Project;
use std::collections::HashMap;

/// Flat field map as stored in a backend hash
pub type FieldMap = HashMap<String, String>;

/// Name of the membership set holding every known project
pub const INDEX_SET: &str = "projects";

/// Prefix of every per-project hash key
pub const KEY_PREFIX: &str = "project:";

/// Hash field holding the project name
pub const FIELD_NAME: &str = "name";
/// Hash field holding the model label
pub const FIELD_MODEL: &str = "model";
/// Hash field holding the data location
pub const FIELD_DATA_LOCATION: &str = "dataLocation";
/// Hash field holding the reference URL
pub const FIELD_URL: &str = "url";

/// Normalized form of a name, as recorded in the index set
pub fn index_member(name: &str) -> String {
    name.to_lowercase()
}

/// Storage key for a project name: `"project:" + lowercase(name)`
///
/// # Examples
///
/// ```
/// use projects_domain::codec::derive_key;
///
/// assert_eq!(derive_key("Foo"), "project:foo");
/// assert_eq!(derive_key("Foo"), derive_key("fOO"));
/// ```
pub fn derive_key(name: &str) -> String {
    format!("{}{}", KEY_PREFIX, index_member(name))
}

/// Index member a storage key belongs to, if it carries the project prefix
pub fn member_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX)
}

/// Field map for a project. Statistics are not persisted.
pub fn to_field_map(project: &Project) -> FieldMap {
    let mut fields = FieldMap::with_capacity(4);
    fields.insert(FIELD_NAME.to_string(), project.name.clone());
    fields.insert(FIELD_MODEL.to_string(), project.model.clone());
    fields.insert(FIELD_DATA_LOCATION.to_string(), project.data_location.clone());
    fields.insert(FIELD_URL.to_string(), project.url.clone());
    fields
}

/// Project from a field map; missing fields come back empty
pub fn from_field_map(fields: &FieldMap) -> Project {
    let field = |name: &str| fields.get(name).cloned().unwrap_or_default();

    Project::new(
        field(FIELD_NAME),
        field(FIELD_MODEL),
        field(FIELD_DATA_LOCATION),
        field(FIELD_URL),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectStats;

    #[test]
    fn test_to_field_map() {
        let project = Project::new("cifar", "resnet50", "/data/cifar", "http://x/cifar");
        let fields = to_field_map(&project);

        assert_eq!(fields.len(), 4);
        assert_eq!(fields["name"], "cifar");
        assert_eq!(fields["model"], "resnet50");
        assert_eq!(fields["dataLocation"], "/data/cifar");
        assert_eq!(fields["url"], "http://x/cifar");
    }

    #[test]
    fn test_stats_not_persisted() {
        let project = Project::new("p", "m", "d", "u").with_stats(ProjectStats {
            accuracy: 0.9,
            precision: 0.8,
        });
        let restored = from_field_map(&to_field_map(&project));

        assert_eq!(restored.stats, ProjectStats::default());
        assert_eq!(restored.name, project.name);
    }

    #[test]
    fn test_from_partial_map() {
        let mut fields = FieldMap::new();
        fields.insert("model".to_string(), "bert".to_string());

        let project = from_field_map(&fields);
        assert_eq!(project.name, "");
        assert_eq!(project.model, "bert");
        assert_eq!(project.url, "");
    }

    #[test]
    fn test_from_empty_map() {
        assert_eq!(from_field_map(&FieldMap::new()), Project::default());
    }

    #[test]
    fn test_member_from_key() {
        assert_eq!(member_from_key("project:cifar"), Some("cifar"));
        assert_eq!(member_from_key("projects"), None);
        assert_eq!(member_from_key("other:cifar"), None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: names differing only by ASCII case share one key
        #[test]
        fn test_key_case_insensitive(name in "[a-zA-Z0-9_-]{1,32}") {
            prop_assert_eq!(derive_key(&name), derive_key(&name.to_uppercase()));
            prop_assert_eq!(derive_key(&name), derive_key(&name.to_lowercase()));
        }

        /// Property: the key is the prefix plus the index member
        #[test]
        fn test_key_matches_member(name in "\\PC{0,32}") {
            let key = derive_key(&name);
            let member = index_member(&name);
            prop_assert_eq!(member_from_key(&key), Some(member.as_str()));
        }

        /// Property: field map round-trip preserves every mapped field
        #[test]
        fn test_field_map_roundtrip(
            name in "[ -~]{1,24}",
            model in "[ -~]{0,24}",
            data_location in "[ -~]{0,24}",
            url in "[ -~]{0,24}",
        ) {
            let project = Project::new(name, model, data_location, url);
            prop_assert_eq!(from_field_map(&to_field_map(&project)), project);
        }
    }
}
