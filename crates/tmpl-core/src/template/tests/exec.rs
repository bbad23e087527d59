use serde_json::json;

use super::*;
use crate::Model;

#[derive(Model, Clone)]
#[tmpl(rename_all = "PascalCase", accessor(name = "Greeting", method = greeting, returns = String))]
struct Person {
    name: String,
    age: i64,
}

impl Person {
    fn greeting(&self) -> String {
        format!("hi {}", self.name)
    }
}

fn person() -> Value {
    Person {
        name: "Ada".to_string(),
        age: 36,
    }
    .to_value()
}

#[test]
fn test_hello_world() {
    let data = json(json!({"Name": "World"}));
    assert_eq!(run("Hello, {{.Name}}!", &data).unwrap(), "Hello, World!");
}

#[test]
fn test_object_fields_and_accessors() {
    let data = person();
    assert_eq!(run("{{.Name}} {{.Age}} {{.Greeting}}", &data).unwrap(), "Ada 36 hi Ada");
}

#[test]
fn test_unknown_field_on_object_fails() {
    let err = run("{{.Missing}}", &person()).unwrap_err();
    assert!(err.to_string().contains("can't evaluate field Missing in type Person"), "{}", err);
}

#[test]
fn test_missing_map_key_prints_no_value() {
    let data = json(json!({}));
    assert_eq!(run("{{.Missing}}", &data).unwrap(), "<no value>");
    let html = run_with("{{.Missing}}", &data, EscapeMode::Html, &FuncMap::new()).unwrap();
    assert_eq!(html, "");
}

#[test]
fn test_nil_receiver_fails() {
    let data = json(json!({"A": null}));
    let err = run("{{.A.B}}", &data).unwrap_err();
    assert!(err.to_string().contains("nil pointer evaluating .B"), "{}", err);
}

#[test]
fn test_if_else_chain() {
    let text = "{{if .A}}a{{else if .B}}b{{else}}c{{end}}";
    assert_eq!(run(text, &json(json!({"A": true, "B": true}))).unwrap(), "a");
    assert_eq!(run(text, &json(json!({"A": false, "B": 1}))).unwrap(), "b");
    assert_eq!(run(text, &json(json!({"A": "", "B": []}))).unwrap(), "c");
}

#[test]
fn test_with_rebinds_dot() {
    let data = json(json!({"User": {"Name": "Bo"}, "Empty": null}));
    assert_eq!(
        run("{{with .User}}{{.Name}}{{end}}|{{with .Empty}}x{{else}}none{{end}}", &data).unwrap(),
        "Bo|none"
    );
}

#[test]
fn test_range_forms() {
    let data = json(json!({"Items": ["a", "b", "c"], "Map": {"z": 1, "a": 2}, "None": []}));
    assert_eq!(run("{{range .Items}}{{.}}{{end}}", &data).unwrap(), "abc");
    assert_eq!(
        run("{{range $i, $e := .Items}}{{$i}}={{$e}} {{end}}", &data).unwrap(),
        "0=a 1=b 2=c "
    );
    assert_eq!(
        run("{{range $k, $v := .Map}}{{$k}}{{$v}}{{end}}", &data).unwrap(),
        "a2z1"
    );
    assert_eq!(run("{{range .None}}x{{else}}empty{{end}}", &data).unwrap(), "empty");
    assert_eq!(run("{{range 3}}{{.}}{{end}}", &data).unwrap(), "012");
}

#[test]
fn test_break_and_continue() {
    let data = json(json!({"Items": [1, 2, 3, 4]}));
    let text = "{{range .Items}}{{if eq . 2}}{{continue}}{{end}}{{if eq . 4}}{{break}}{{end}}{{.}}{{end}}";
    assert_eq!(run(text, &data).unwrap(), "13");
}

#[test]
fn test_range_over_scalar_fails() {
    let err = run("{{range .}}{{end}}", &Value::Bool(true)).unwrap_err();
    assert!(err.to_string().contains("range can't iterate over true"), "{}", err);
}

#[test]
fn test_variables_and_root() {
    let data = json(json!({"Title": "T", "Items": ["x"]}));
    assert_eq!(
        run("{{$t := .Title}}{{range .Items}}{{$t}}{{$.Title}}{{.}}{{end}}", &data).unwrap(),
        "TTx"
    );
    assert_eq!(run("{{$x := 1}}{{$x = 2}}{{$x}}", &data).unwrap(), "2");
}

#[test]
fn test_template_invocation() {
    let data = json(json!({"User": {"Name": "Bo"}}));
    let text = r#"{{define "user"}}<{{.Name}}>{{end}}{{template "user" .User}}"#;
    assert_eq!(run(text, &data).unwrap(), "<Bo>");

    let err = run(r#"{{template "nope" .}}"#, &data).unwrap_err();
    assert!(err.to_string().contains("no such template \"nope\""), "{}", err);
}

#[test]
fn test_recursion_depth_is_bounded() {
    let err = run(r#"{{define "r"}}{{template "r" .}}{{end}}{{template "r" .}}"#, &Value::Nil)
        .unwrap_err();
    assert!(err.to_string().contains("exceeded maximum template depth"), "{}", err);
}

#[test]
fn test_pipelines_and_parens() {
    let data = json(json!({"Items": ["a", "b"], "N": 3}));
    assert_eq!(run("{{.Items | len}}", &data).unwrap(), "2");
    assert_eq!(run(r#"{{printf "%d-%s" .N "x"}}"#, &data).unwrap(), "3-x");
    assert_eq!(run("{{(index .Items 1)}}", &data).unwrap(), "b");
    assert_eq!(run(r#"{{"abc" | printf "%s!"}}"#, &data).unwrap(), "abc!");
}

#[test]
fn test_and_or_short_circuit() {
    let data = json(json!({"Zero": 0}));
    // the second operand would fail if evaluated
    assert_eq!(run("{{and .Zero (index .Nope 1)}}", &data).unwrap(), "0");
    assert_eq!(run(r#"{{or "x" (index .Nope 1)}}"#, &data).unwrap(), "x");
    assert_eq!(run("{{or 0 false}}", &data).unwrap(), "false");
}

#[test]
fn test_custom_functions_override_builtins() {
    let mut funcs = FuncMap::new();
    funcs.insert(
        "shout".to_string(),
        Function::new(|args| Ok(Value::String(args[0].to_string().to_uppercase()))),
    );
    funcs.insert("len".to_string(), Function::new(|_| Ok(Value::Int(-1))));
    let data = json(json!({"S": "hey"}));
    let out = run_with("{{shout .S}} {{len .S}}", &data, EscapeMode::None, &funcs).unwrap();
    assert_eq!(out, "HEY -1");
}

#[test]
fn test_undefined_function_fails() {
    let err = run("{{nope 1}}", &Value::Nil).unwrap_err();
    assert!(err.to_string().contains("function \"nope\" not defined"), "{}", err);
}

#[test]
fn test_html_escaping_applies_to_actions_only() {
    let data = json(json!({"X": "<b>&</b>"}));
    let out = run_with("<p>{{.X}}</p>", &data, EscapeMode::Html, &FuncMap::new()).unwrap();
    assert_eq!(out, "<p>&lt;b&gt;&amp;&lt;/b&gt;</p>");
}

#[test]
fn test_trim_markers() {
    let data = json(json!({"A": "x"}));
    assert_eq!(run("a  {{- .A -}}  b", &data).unwrap(), "axb");
}

#[test]
fn test_exec_error_position() {
    let err = run("line\n  {{.A.B}}", &json(json!({"A": 1}))).unwrap_err();
    match err {
        RenderError::Exec { name, line, col, .. } => {
            assert_eq!(name, "t");
            assert_eq!((line, col), (2, 5));
        }
        other => panic!("Expected Exec error, got {:?}", other),
    }
}

#[test]
fn test_undefined_entry() {
    let trees = forest("x");
    let funcs = FuncMap::new();
    let err = Executor::new(&trees, &funcs, EscapeMode::None)
        .execute("other", &Value::Nil, &mut String::new())
        .unwrap_err();
    assert!(matches!(err, RenderError::UndefinedTemplate { name } if name == "other"));
}
