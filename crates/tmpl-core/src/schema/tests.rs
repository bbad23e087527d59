use std::collections::{BTreeMap, HashMap};

use super::*;
use crate::Model;

#[derive(Model, Clone)]
#[tmpl(
    rename_all = "PascalCase",
    accessor(name = "Method1", method = method1, returns = String),
    accessor(name = "Method2", method = method2, returns = Leaf),
    accessor(name = "Method3", method = method3, returns = FieldTree)
)]
struct FieldTree {
    title: String,
}

impl FieldTree {
    fn method1(&self) -> String {
        self.title.clone()
    }

    fn method2(&self) -> Leaf {
        Leaf { field1: 1 }
    }

    fn method3(&self) -> FieldTree {
        self.clone()
    }
}

#[derive(Model, Clone)]
#[tmpl(rename_all = "PascalCase")]
struct Leaf {
    field1: i32,
}

#[test]
fn test_accessor_paths_resolve() {
    let tree = SchemaTree::build(&FieldTree {
        title: "t".to_string(),
    })
    .unwrap();

    for path in [
        ".Title",
        ".Method1",
        ".Method2.Field1",
        ".Method3.Method1",
        ".Method3.Method3.Method2.Field1",
    ] {
        assert!(tree.find(path).is_some(), "{} should resolve", path);
    }
    assert!(tree.find(".Method4").is_none());
    assert!(tree.find(".Method2.Field2").is_none());
}

#[test]
fn test_accessor_cycle_is_finite() {
    let tree = SchemaTree::build(&FieldTree {
        title: String::new(),
    })
    .unwrap();

    // root, Title, Method1, Method2, Method2.Field1, Method3 (linked to root)
    assert_eq!(tree.len(), 6);

    let method3 = tree.find(".Method3").unwrap();
    assert_eq!(method3.link().map(|n| n.id()), Some(tree.root().id()));
    assert_eq!(method3.kind(), Kind::Struct);
}

#[derive(Model, Clone)]
#[tmpl(rename_all = "PascalCase", accessor(name = "Back", method = back, returns = A))]
struct B {
    label: String,
}

impl B {
    fn back(&self) -> A {
        A {
            label: self.label.clone(),
        }
    }
}

#[derive(Model, Clone)]
#[tmpl(rename_all = "PascalCase", accessor(name = "Next", method = next, returns = B))]
struct A {
    label: String,
}

impl A {
    fn next(&self) -> B {
        B {
            label: self.label.clone(),
        }
    }
}

#[test]
fn test_two_type_cycle_bounded_by_chain_length() {
    let tree = SchemaTree::build(&A {
        label: String::new(),
    })
    .unwrap();

    // A, A.Label, A.Next, A.Next.Label, A.Next.Back (linked to A)
    assert_eq!(tree.len(), 5);
    assert!(tree.find(".Next.Back.Next.Back.Label").is_some());
}

#[derive(Model)]
#[tmpl(rename_all = "PascalCase")]
struct Base {
    id: i64,
    name: String,
}

#[derive(Model)]
#[tmpl(rename_all = "PascalCase")]
struct Page {
    #[tmpl(embed)]
    base: Base,
    name: String,
}

#[test]
fn test_embedded_members_are_promoted_once() {
    let tree = SchemaTree::build(&Page {
        base: Base {
            id: 1,
            name: "base".to_string(),
        },
        name: "page".to_string(),
    })
    .unwrap();

    let names: Vec<&str> = tree.root().children().map(|c| c.name()).collect();
    assert_eq!(names, vec!["Base", "Id", "Name"]);

    assert_eq!(tree.find("Id").map(|n| n.kind()), Some(Kind::Int));
    assert!(tree.find("Base.Id").is_some());
    assert!(tree.find("Base.Name").is_some());

    // the direct member shadows the promoted one
    let direct = tree.find("Name").unwrap();
    let promoted = tree.find("Base.Name").unwrap();
    assert_ne!(direct.id(), promoted.id());
    assert_eq!(tree.find("Id").unwrap().id(), tree.find("Base.Id").unwrap().id());
}

#[derive(Model)]
struct Collections {
    flags: BTreeMap<String, bool>,
    users: HashMap<String, Leaf>,
    items: Vec<Leaf>,
    maybe: Option<Leaf>,
}

#[test]
fn test_collections() {
    let tree = SchemaTree::build(&Collections {
        flags: BTreeMap::new(),
        users: HashMap::new(),
        items: Vec::new(),
        maybe: None,
    })
    .unwrap();

    assert_eq!(tree.find("flags.debug").map(|n| n.kind()), Some(Kind::Bool));
    assert_eq!(tree.find("users.alice.Field1").map(|n| n.kind()), Some(Kind::Int));
    assert_eq!(tree.find("items").map(|n| n.kind()), Some(Kind::Sequence));
    assert!(tree.find("items.Field1").is_some());
    assert_eq!(tree.find("maybe").map(|n| n.kind()), Some(Kind::Optional));
    assert!(tree.find("maybe.Field1").is_some());
    assert!(tree.find("items.Field2").is_none());
}

#[derive(Model)]
struct Dynamic {
    data: serde_json::Value,
    boxed: Value,
    flag: Value,
}

#[test]
fn test_dynamic_members_use_runtime_value() {
    let tree = SchemaTree::build(&Dynamic {
        data: serde_json::json!({"any": {"thing": 1}}),
        boxed: Leaf { field1: 3 }.to_value(),
        flag: Value::Bool(true),
    })
    .unwrap();

    let data = tree.find("data.any.thing").unwrap();
    assert_eq!(data.name(), "data");
    assert_eq!(data.dynamic_kind(), Some(Kind::Map));
    assert!(data.is_open());

    let boxed = tree.find("boxed").unwrap();
    assert_eq!(boxed.kind(), Kind::Dynamic);
    assert_eq!(boxed.dynamic_kind(), Some(Kind::Struct));
    assert_eq!(tree.find("boxed.Field1").map(|n| n.kind()), Some(Kind::Int));
    assert!(tree.find("boxed.Other").is_none());

    assert_eq!(tree.find("flag").and_then(|n| n.effective_kind()), Some(Kind::Bool));
}

#[derive(Model)]
struct Duplicate {
    #[tmpl(name = "X")]
    a: i32,
    #[tmpl(name = "X")]
    b: i32,
}

#[test]
fn test_duplicate_member_names() {
    let result = SchemaTree::build(&Duplicate { a: 1, b: 2 });
    match result {
        Err(CompileError::Schema { type_name, reason }) => {
            assert_eq!(type_name, "Duplicate");
            assert!(reason.contains("'X'"));
        }
        _ => panic!("Expected Schema error"),
    }
}

#[derive(Model)]
struct Chain {
    value: i32,
    next: Option<Box<Chain>>,
}

#[test]
fn test_direct_field_cycle_is_finite() {
    let tree = SchemaTree::build(&Chain {
        value: 1,
        next: Some(Box::new(Chain {
            value: 2,
            next: None,
        })),
    })
    .unwrap();

    // Chain, value, next, next.value, next.next (linked)
    assert_eq!(tree.len(), 5);
    assert!(tree.find("next.next.next.value").is_some());
}

#[test]
fn test_path_helpers() {
    assert_eq!(split_path(".A.B"), vec!["A", "B"]);
    assert!(split_path("").is_empty());
    assert!(split_path(".").is_empty());
    assert_eq!(join_path("", ".A"), "A");
    assert_eq!(join_path("Items", ".Name"), "Items.Name");
    assert_eq!(join_path("Items", ""), "Items");
}
