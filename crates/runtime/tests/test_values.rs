//! Tagged values crossing arena boundaries
//!
//! A value built in a short-lived arena can survive in three ways: promotion
//! into a longer-lived arena, detaching into a `TypedValue`, or (for files)
//! moving its stream to the new arena. Each path is checked against the
//! source arena actually being destroyed.

use sn_runtime::{Any, AnySerialize, Arena, ArrayRef, RtArray, TextFile, TypedValue};

#[test]
fn test_promoted_any_array_is_independent() {
    let parent = Arena::new();
    let promoted = {
        let child = parent.child();
        let mut items = RtArray::null();
        items.push(&child, Any::box_string(Some(child.strdup("x"))));
        items.push(&child, Any::box_double(0.5));
        let items = child.alloc_value(items);
        Any::from_array(&*items).promote(&parent)
    };

    let ArrayRef::Any(items) = promoted.unbox_array() else {
        panic!("expected any[]");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].unbox_string(), Some("x"));
    assert_eq!(items.join(&parent, Some("|")), "\"x\"|0.5");
}

#[test]
fn test_detached_value_rehydrates_elsewhere() {
    let bytes = {
        let arena = Arena::new();
        let nums = RtArray::range(&arena, 1, 4);
        Any::from_array(&nums).to_bytes().unwrap()
    };

    let arena = Arena::new();
    let value = TypedValue::from_bytes(&bytes).unwrap().to_any(&arena).unwrap();
    let ArrayRef::Long(nums) = value.unbox_array() else {
        panic!("expected long[]");
    };
    assert_eq!(nums.as_slice(), &[1, 2, 3]);
}

#[test]
fn test_file_outlives_opening_arena_after_promote() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let path = path.to_str().unwrap();

    let parent = Arena::new();
    let file = {
        let child = parent.child();
        let file = TextFile::create(&child, path).unwrap();
        file.write_line("from child").unwrap();
        file.promote(&parent).unwrap()
    };
    file.write_line("from parent").unwrap();
    parent.destroy();

    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "from child\nfrom parent\n"
    );
}
