use lumen_template::{AttrKind, CompileError, CompileOptions, Node, parse_template};

fn parse(src: &str) -> Vec<Node> {
    match parse_template(src, &CompileOptions::default()).unwrap() {
        Node::Root(children) => children,
        other => panic!("expected root, got {other:?}"),
    }
}

fn parse_strict(src: &str) -> Result<Node, CompileError> {
    parse_template(src, &CompileOptions::strict())
}

#[test]
fn parse_element_with_text() {
    let ast = parse("<div>hi</div>");
    assert_eq!(ast.len(), 1);
    match &ast[0] {
        Node::Element { tag, children, .. } => {
            assert_eq!(tag, "div");
            assert_eq!(children, &vec![Node::Text("hi".into())]);
        }
        _ => panic!("expected element"),
    }
}

#[test]
fn parse_text_and_interpolation() {
    let ast = parse("<p>Hello {{ name | uppercase }}</p>");
    match &ast[0] {
        Node::Element { children, .. } => {
            assert_eq!(children[0], Node::Text("Hello ".into()));
            assert_eq!(children[1], Node::Interpolation("name | uppercase".into()));
        }
        _ => panic!("expected element"),
    }
}

#[test]
fn parse_attrs_static_property_event() {
    let ast = parse(r#"<input class="x" [value]="count" (input)="onInput($event)"/>"#);
    match &ast[0] {
        Node::Element {
            attrs,
            self_closing,
            ..
        } => {
            assert!(*self_closing);
            assert_eq!(attrs.len(), 3);
            assert_eq!(attrs[0].kind, AttrKind::Static);
            assert_eq!(attrs[1].kind, AttrKind::Property);
            assert_eq!(attrs[1].name, "[value]");
            assert_eq!(attrs[1].bare_name(), "value");
            assert_eq!(attrs[2].kind, AttrKind::Event);
            assert_eq!(attrs[2].value.as_deref(), Some("onInput($event)"));
        }
        _ => panic!("expected element"),
    }
}

#[test]
fn void_elements_do_not_nest() {
    let ast = parse("<div><input type=checkbox checked><span>x</span></div>");
    let Node::Element { children, .. } = &ast[0] else {
        panic!("expected element");
    };
    assert_eq!(children.len(), 2);
    match &children[0] {
        Node::Element {
            tag,
            attrs,
            children,
            ..
        } => {
            assert_eq!(tag, "input");
            assert!(children.is_empty());
            assert_eq!(attrs[0].value.as_deref(), Some("checkbox"));
            assert_eq!(attrs[1].value, None);
        }
        _ => panic!("expected input"),
    }
}

#[test]
fn if_else_chain_forms_one_node() {
    let ast = parse("@if (a) {A} @else if (b) {B} @else {C}");
    assert_eq!(ast.len(), 1);
    let Node::If(branches) = &ast[0] else {
        panic!("expected @if");
    };
    let conditions: Vec<Option<&str>> = branches.iter().map(|b| b.condition.as_deref()).collect();
    assert_eq!(conditions, vec![Some("a"), Some("b"), None]);
    assert_eq!(branches[2].children, vec![Node::Text("C".into())]);
}

#[test]
fn condition_parens_inside_strings() {
    let ast = parse("@if(label == ')'){x}");
    let Node::If(branches) = &ast[0] else {
        panic!("expected @if");
    };
    assert_eq!(branches[0].condition.as_deref(), Some("label == ')'"));
}

#[test]
fn for_block_keeps_declaration() {
    let ast = parse("<ul>@for(let item of items; track item.id){<li>{{item.name}}</li>}</ul>");
    let Node::Element { children, .. } = &ast[0] else {
        panic!("expected element");
    };
    match &children[0] {
        Node::For {
            declaration,
            children,
        } => {
            assert_eq!(declaration, "let item of items; track item.id");
            assert_eq!(children.len(), 1);
        }
        other => panic!("expected @for, got {other:?}"),
    }
}

#[test]
fn interpolation_skips_nested_object_braces() {
    let ast = parse("{{ {a:{b:1}}.a.b }} and {{ '}}' }}");
    assert_eq!(
        ast,
        vec![
            Node::Interpolation("{a:{b:1}}.a.b".into()),
            Node::Text(" and ".into()),
            Node::Interpolation("'}}'".into()),
        ]
    );
}

#[test]
fn stray_brace_is_text() {
    let ast = parse("<p>a } b</p>");
    assert_eq!(ast[0].children(), &[Node::Text("a } b".into())]);
}

#[test]
fn at_sign_without_keyword_is_text() {
    let ast = parse("<p>mail@example.com</p>");
    assert_eq!(ast[0].children(), &[Node::Text("mail@example.com".into())]);
}

#[test]
fn comments_are_skipped() {
    let ast = parse("<p>a<!-- note -->b</p>");
    assert_eq!(ast[0].children(), &[Node::Text("ab".into())]);
}

#[test]
fn close_tag_closes_intervening_frames() {
    let ast = parse("<div><span>x</div><p>y</p>");
    assert_eq!(ast.len(), 2);
    let span = &ast[0].children()[0];
    assert!(matches!(span, Node::Element { tag, .. } if tag == "span"));
    assert_eq!(span.children(), &[Node::Text("x".into())]);
}

#[test]
fn close_tag_matches_case_insensitively() {
    let ast = parse("<DIV>x</div>after");
    assert_eq!(ast.len(), 2);
    assert_eq!(ast[1], Node::Text("after".into()));
}

#[test]
fn whitespace_between_elements_is_dropped() {
    let ast = parse("<div>\n  <span>a</span>\n  <span>b</span>\n</div>");
    assert_eq!(ast[0].children().len(), 2);
}

#[test]
fn whitespace_between_interpolations_is_kept() {
    let ast = parse("<p>{{ a }} {{ b }}</p>");
    assert_eq!(
        ast[0].children(),
        &[
            Node::Interpolation("a".into()),
            Node::Text(" ".into()),
            Node::Interpolation("b".into()),
        ]
    );
}

#[test]
fn tolerant_mode_forgives_structure() {
    // dangling else dropped, unmatched close ignored, open block closed at end
    let ast = parse("@else {x}</section>@if(a){y");
    assert_eq!(ast.len(), 1);
    let Node::If(branches) = &ast[0] else {
        panic!("expected @if");
    };
    assert_eq!(branches[0].children, vec![Node::Text("y".into())]);
}

#[test]
fn strict_mode_rejects_dangling_else() {
    let err = parse_strict("<p></p>@else {x}").unwrap_err();
    assert!(matches!(err, CompileError::Structure { .. }));
}

#[test]
fn strict_mode_rejects_unmatched_close() {
    let err = parse_strict("<p>x</p></div>").unwrap_err();
    assert!(matches!(err, CompileError::Structure { offset: 8, .. }));
}

#[test]
fn strict_mode_rejects_unclosed_block() {
    assert!(parse_strict("@for(let x of xs){<b>{{x}}</b>").is_err());
    assert!(parse_strict("<div>@if(a){x</div>").is_err());
    assert!(parse_strict("@if(a){x} @else {y}").is_ok());
}
