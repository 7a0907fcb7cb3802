use lumen_core::Value;
use lumen_style::{GlobalStyles, Rule, StyleOrigin, Stylesheet, style_node};

#[test]
fn parses_declarations_in_order() {
    let css = ".app { background: #101216; color: #e6edf3; font-size: 18px; }";
    let ss = Stylesheet::parse(css);
    assert_eq!(ss.rules.len(), 1);
    match &ss.rules[0] {
        Rule::Style { selectors, decls } => {
            assert_eq!(selectors, &vec![".app".to_string()]);
            let keys: Vec<&str> = decls.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["background", "color", "font-size"]);
        }
        other => panic!("expected style rule, got {other:?}"),
    }
}

#[test]
fn selector_lists_and_comments() {
    let css = "/* header */ h1,\n  .title   span { margin: 0 }";
    let ss = Stylesheet::parse(css);
    assert_eq!(ss.to_css(), "h1, .title span { margin: 0; }");
}

#[test]
fn at_rules_are_kept_verbatim() {
    let css = "@media (max-width: 600px) { .a { color: red; } } p { color: blue; }";
    let ss = Stylesheet::parse(css);
    assert_eq!(ss.rules.len(), 2);
    assert!(matches!(&ss.rules[0], Rule::At { prelude, .. } if prelude == "@media (max-width: 600px)"));
    assert_eq!(
        ss.to_css(),
        "@media (max-width: 600px) { .a { color: red; } }\np { color: blue; }"
    );
}

#[test]
fn empty_blocks_are_skipped() {
    let ss = Stylesheet::parse("div {} { color: red; } span { color: red");
    assert!(ss.is_empty());
}

#[test]
fn style_node_carries_css() {
    let ss = Stylesheet::parse("b { font-weight: bold; }");
    let node = style_node(&ss, StyleOrigin::Component);
    assert_eq!(node.tag(), Some("style"));
    assert_eq!(
        node.props().and_then(|p| p.get("data-lumen")),
        Some(&Value::from("component"))
    );
    assert_eq!(node.text_content(), "b { font-weight: bold; }");
}

#[test]
fn global_styles_are_shared_between_clones() {
    let globals = GlobalStyles::new();
    let view = globals.clone();
    globals.add_css("body { margin: 0; }");
    globals.add_css("a { color: inherit; }");
    assert_eq!(view.len(), 2);
    let nodes = view.nodes();
    assert_eq!(nodes[1].text_content(), "a { color: inherit; }");
    view.clear();
    assert!(globals.is_empty());
}
