use nanoid::nanoid;

/// Canonical alphabet for mailsift entity identifiers (no ambiguous glyphs).
const ENTITY_ID_ALPHABET: &[char] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
/// Length of the random portion, after the type prefix.
const ENTITY_ID_LENGTH: usize = 16;

fn generate(prefix: &str) -> String {
    format!("{}_{}", prefix, nanoid!(ENTITY_ID_LENGTH, ENTITY_ID_ALPHABET))
}

/// New organization identifier (`org_...`).
pub fn organization_id() -> String {
    generate("org")
}

/// New audience list identifier (`lst_...`).
pub fn audience_list_id() -> String {
    generate("lst")
}

/// New contact identifier (`ctc_...`).
pub fn contact_id() -> String {
    generate("ctc")
}

/// New segment identifier (`seg_...`).
pub fn segment_id() -> String {
    generate("seg")
}

/// New custom field definition identifier (`cf_...`).
pub fn custom_field_id() -> String {
    generate("cf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_expected_prefix_length_and_charset() {
        let id = contact_id();
        let (prefix, random) = id.split_once('_').expect("id should contain a separator");
        assert_eq!(prefix, "ctc");
        assert_eq!(random.len(), ENTITY_ID_LENGTH);
        assert!(random.chars().all(|c| ENTITY_ID_ALPHABET.contains(&c)));
    }

    #[test]
    fn prefixes_distinguish_entity_kinds() {
        assert!(organization_id().starts_with("org_"));
        assert!(audience_list_id().starts_with("lst_"));
        assert!(segment_id().starts_with("seg_"));
        assert!(custom_field_id().starts_with("cf_"));
    }
}
