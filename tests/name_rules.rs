//! Name-identity rules: mangling suffixes, enum tokens, reserved suffixes,
//! generic names, and the remap table.

use hdrmend::config::Config;
use hdrmend::matcher::{is_generic, names_match};

fn cfg_with_suffixes() -> Config {
    let mut cfg = Config::default();
    cfg.known_reserved_suffixes
        .insert("__Array".into(), "Il2CppArray".into());
    cfg.known_reserved_suffixes
        .insert("__Class".into(), "Il2CppClass".into());
    cfg
}

#[test]
fn duplicate_suffix_matches_canonical_name() {
    let cfg = Config::default();
    assert!(names_match(&cfg, "Foo_3", "Foo"));
    assert!(names_match(&cfg, "Foo", "Foo_3"));
    assert!(!names_match(&cfg, "Foo_3", "Bar"));
}

#[test]
fn generic_instantiation_does_not_collapse_to_base() {
    let cfg = Config::default();
    assert!(!names_match(&cfg, "List_1_Foo", "Foo"));
    assert!(!names_match(&cfg, "Action_2_Foo", "Foo"));
}

#[test]
fn enum_token_is_stripped_on_both_sides() {
    let cfg = Config::default();
    assert!(names_match(&cfg, "Col__Enum", "Col"));
    assert!(names_match(&cfg, "Col", "Col__Enum"));
    assert!(names_match(&cfg, "Col__Enum", "Col__Enum"));
}

#[test]
fn reserved_suffix_never_collapses() {
    let cfg = cfg_with_suffixes();
    assert!(!names_match(&cfg, "Foo__Array", "Foo"));
    assert!(!names_match(&cfg, "Foo", "Foo__Class"));
    assert!(names_match(&cfg, "Foo__Array", "Foo__Array"));
}

#[test]
fn plain_names_compare_exactly() {
    let cfg = Config::default();
    assert!(names_match(&cfg, "Vector3", "Vector3"));
    assert!(!names_match(&cfg, "Vector3", "Vector2"));
    // both mangled: no suffix stripping applies
    assert!(!names_match(&cfg, "Foo_1", "Foo_2"));
}

#[test]
fn generic_requires_digits_then_more_components() {
    let cfg = cfg_with_suffixes();
    assert!(is_generic(&cfg, "List_1_Foo"));
    assert!(is_generic(&cfg, "Dictionary_2_K_V"));
    assert!(is_generic(&cfg, "Action_2_Foo"));
    // duplicate-name suffix, not an arity
    assert!(!is_generic(&cfg, "Bar_2"));
    assert!(!is_generic(&cfg, "Foo"));
    assert!(!is_generic(&cfg, "Col__Enum"));
    // reserved suffix wins over genericity
    assert!(!is_generic(&cfg, "List_1_Foo__Array"));
}

#[test]
fn remap_table_applies_symmetrically() {
    let mut cfg = Config::default();
    cfg.remapped_types
        .insert("OldName".into(), "NewName".into());
    assert!(names_match(&cfg, "OldName", "NewName"));
    assert!(names_match(&cfg, "NewName", "OldName"));
}

#[test]
fn matching_is_symmetric() {
    let cfg = cfg_with_suffixes();
    let names = [
        "Foo", "Foo_3", "List_1_Foo", "Col__Enum", "Col", "Foo__Array", "Bar_2", "Bar",
    ];
    for a in names {
        for b in names {
            assert_eq!(
                names_match(&cfg, a, b),
                names_match(&cfg, b, a),
                "asymmetric for ({a}, {b})"
            );
        }
    }
}
