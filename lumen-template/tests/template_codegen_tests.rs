use lumen_template::{CompileOptions, compile, compile_with};

#[test]
fn dump_elements_and_text() {
    let t = compile(r#"<div class="app">hi {{ name }}</div>"#).unwrap();
    assert_eq!(
        t.source(),
        r#"[h("div", { "class": "app" }, [text("hi "), text(name)])]"#
    );
}

#[test]
fn dump_expands_pipes() {
    let t = compile("{{ title | uppercase | slice:0:2 }}").unwrap();
    assert_eq!(
        t.source(),
        "[text(pipe('slice').transform(pipe('uppercase').transform(title), 0, 2))]"
    );
}

#[test]
fn dump_control_flow() {
    let t = compile("@if(a){<p>A</p>} @else if(b){B} @else {C}").unwrap();
    assert_eq!(
        t.source(),
        r#"[...(a ? [h("p", {}, [text("A")])] : b ? [text("B")] : [text("C")])]"#
    );

    let t = compile("@for(let x of xs; track x){<i>{{x}}</i>}").unwrap();
    assert_eq!(
        t.source(),
        r#"[...(xs).map((x, $index) => [h("i", {}, [text(x)])])]"#
    );
}

#[test]
fn dump_bindings() {
    let t = compile(r#"<input [value]="v" (input)="v = $event">"#).unwrap();
    assert_eq!(
        t.source(),
        r#"[h("input", { "[value]": v, "(input)": ($event) => { v = $event } }, [])]"#
    );
}

#[test]
fn if_without_else_falls_back_to_nothing() {
    let t = compile("@if(a){x}").unwrap();
    assert_eq!(t.source(), r#"[...(a ? [text("x")] : [])]"#);
}

#[test]
fn strict_compile_reports_structure() {
    assert!(compile("<p>@if(a){x</p>").is_ok());
    assert!(compile_with("<p>@if(a){x</p>", &CompileOptions::strict()).is_err());
}
