mod common;

use common::test_helpers::TestFixtures;
use xpathfinder::{
    ParseError, PrefixError, QueryError, XPathValue, XmlNode, load, load_str, render_value,
};

#[test]
fn test_catalog_default_namespace_is_addressable() {
    let fixtures = TestFixtures::new();
    let loaded = load(&fixtures.catalog()).unwrap();

    assert_eq!(loaded.default_prefix(), Some("ns"));
    let namespaces = loaded.namespaces().unwrap();
    assert_eq!(namespaces.get("ns"), Some("urn:example:catalog"));
    assert_eq!(namespaces.get("dc"), Some("http://purl.org/dc/elements/1.1/"));
    assert_eq!(namespaces.len(), 2);

    let books = loaded
        .document
        .xpath("/ns:catalog/ns:book", loaded.namespaces())
        .unwrap();
    assert_eq!(books.len(), 2);
    assert!(books.iter().all(|value| value.as_node().is_some()));

    let title = loaded
        .document
        .xpath(
            "/ns:catalog/ns:book[@id='b1']/dc:title/text()",
            loaded.namespaces(),
        )
        .unwrap();
    assert_eq!(title, vec![XPathValue::String("Rust in Practice".to_string())]);
}

#[test]
fn test_rendered_node_is_namespace_free() {
    let fixtures = TestFixtures::new();
    let loaded = load(&fixtures.catalog()).unwrap();

    let results = loaded
        .document
        .xpath("//ns:book[@id='b1']", loaded.namespaces())
        .unwrap();
    let rendered = render_value(&results[0]).unwrap();

    assert!(rendered.starts_with(r#"<book id="b1" lang="en">"#));
    assert!(rendered.contains("<title>Rust in Practice</title>"));
    assert!(rendered.contains(r#"<price currency="EUR">39.90</price>"#));
    assert!(!rendered.contains("xmlns"));
    assert!(!rendered.contains("dc:"));
}

#[test]
fn test_comments_survive_in_results() {
    let fixtures = TestFixtures::new();
    let loaded = load(&fixtures.catalog()).unwrap();
    let comments = loaded.document.xpath("//comment()", None).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(render_value(&comments[0]).unwrap(), "<!-- sample catalog -->");
}

#[test]
fn test_taken_prefixes_are_skipped() {
    let fixtures = TestFixtures::new();
    let loaded = load(&fixtures.taken_prefix()).unwrap();

    assert_eq!(loaded.default_prefix(), Some("ns__"));
    let namespaces = loaded.namespaces().unwrap();
    assert_eq!(namespaces.get("ns"), Some("urn:example:other"));
    assert_eq!(namespaces.get("ns_"), Some("urn:example:third"));
    assert_eq!(namespaces.get("ns__"), Some("urn:example:feed"));

    let count = loaded
        .document
        .xpath("count(/ns__:feed/ns__:entry/ns:id)", loaded.namespaces())
        .unwrap();
    assert_eq!(count, vec![XPathValue::Number(1.0)]);
}

#[test]
fn test_document_without_default_namespace() {
    let fixtures = TestFixtures::new();
    let loaded = load(&fixtures.no_default()).unwrap();

    assert!(loaded.namespaces().is_none());
    assert!(loaded.default_prefix().is_none());

    let notes = loaded.document.xpath("count(/inventory/note)", None).unwrap();
    assert_eq!(notes, vec![XPathValue::Number(1.0)]);

    // Declared prefixes are not bound for XPath without a default namespace
    assert!(matches!(
        loaded.document.xpath("//inv:item", None),
        Err(QueryError::Invalid { .. })
    ));
}

#[test]
fn test_non_utf8_document() {
    let fixtures = TestFixtures::new();
    let loaded = load(&fixtures.latin1()).unwrap();
    let body = loaded
        .document
        .xpath("string(/ns:note/ns:body)", loaded.namespaces())
        .unwrap();
    assert_eq!(body, vec![XPathValue::String("café".to_string())]);
}

#[test]
fn test_malformed_document_is_parse_error() {
    let fixtures = TestFixtures::new();
    match load(&fixtures.malformed()).unwrap_err() {
        ParseError::Malformed {
            source_name,
            details,
        } => {
            assert!(source_name.ends_with("malformed.xml"));
            assert!(!details.is_empty());
        }
        other => panic!("Expected Malformed, got {:?}", other),
    }
}

#[test]
fn test_missing_file_is_parse_error() {
    let fixtures = TestFixtures::new();
    let missing = fixtures.xml_dir().join("does_not_exist.xml");
    assert!(matches!(
        load(&missing).unwrap_err(),
        ParseError::Unreadable { .. }
    ));
}

#[test]
fn test_synthesized_prefix_never_collides() {
    let declared_sets: [&[&str]; 5] = [
        &[],
        &["ns"],
        &["ns", "ns_"],
        &["a", "ns_", "b"],
        &["ns", "ns_", "ns__", "ns___"],
    ];

    for declared in declared_sets {
        let declarations: String = declared
            .iter()
            .map(|prefix| format!(r#" xmlns:{}="urn:declared:{}""#, prefix, prefix))
            .collect();
        let xml = format!(r#"<root xmlns="urn:default"{}><child/></root>"#, declarations);
        let loaded = load_str(&xml).unwrap();

        let prefix = loaded.default_prefix().unwrap();
        assert!(!declared.contains(&prefix), "{} collides in {:?}", prefix, declared);

        let namespaces = loaded.namespaces().unwrap();
        assert_eq!(
            namespaces.prefixes_for("urn:default").collect::<Vec<_>>(),
            vec![prefix]
        );
        assert_eq!(namespaces.len(), declared.len() + 1);

        let expression = format!("count(/{0}:root/{0}:child)", prefix);
        assert_eq!(
            loaded.document.xpath(&expression, loaded.namespaces()).unwrap(),
            vec![XPathValue::Number(1.0)]
        );
    }
}

#[test]
fn test_rename_keeps_single_default_binding() {
    let fixtures = TestFixtures::new();
    let mut loaded = load(&fixtures.catalog()).unwrap();

    assert!(loaded.is_valid_new_prefix("ns"));
    assert!(loaded.is_valid_new_prefix("cat"));
    assert!(!loaded.is_valid_new_prefix("dc"));
    assert!(!loaded.is_valid_new_prefix("has space"));

    assert_eq!(
        loaded.rename_prefix("dc"),
        Err(PrefixError::Collision {
            prefix: "dc".to_string()
        })
    );
    loaded.rename_prefix("cat").unwrap();
    loaded.rename_prefix("cat").unwrap();

    let namespaces = loaded.namespaces().unwrap();
    assert_eq!(
        namespaces.prefixes_for("urn:example:catalog").collect::<Vec<_>>(),
        vec!["cat"]
    );

    let magazines = loaded
        .document
        .xpath("/cat:catalog/cat:magazine", loaded.namespaces())
        .unwrap();
    assert_eq!(magazines.len(), 1);
    assert_eq!(magazines[0].as_node().unwrap().local_name(), "magazine");
}
