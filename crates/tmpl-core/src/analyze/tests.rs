use std::collections::BTreeMap;

use super::*;
use crate::Model;

fn typing() -> Vec<Arc<dyn Analyzer>> {
    vec![Arc::new(StaticTyping)]
}

fn report<T: Model>(root: &T) -> AnalysisReport {
    analyze(root, &Options::default(), &typing()).unwrap()
}

fn errors<T: Model>(root: &T) -> Vec<String> {
    report(root).errors
}

#[derive(Model, Default)]
#[tmpl(text = "{{.Title}} {{if .Draft}}draft{{end}} {{range .Tags}}{{.}}{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct Clean {
    title: String,
    draft: bool,
    tags: Vec<String>,
}

#[test]
fn test_clean_template_has_no_diagnostics() {
    let report = report(&Clean::default());
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[derive(Model, Default)]
#[tmpl(text = "{{.Missing}}\n{{.Title.Deeper}}")]
#[tmpl(rename_all = "PascalCase")]
struct Undefined {
    title: String,
}

#[test]
fn test_undefined_fields_are_reported_with_positions() {
    let errors = errors(&Undefined::default());
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert_eq!(
        errors[0],
        "Undefined:1:3: field \"Missing\" not defined in type Undefined"
    );
    assert!(errors[1].starts_with("Undefined:2:"), "{}", errors[1]);
    assert!(errors[1].contains("field \"Title.Deeper\" not defined"));
}

#[derive(Model, Default)]
#[tmpl(text = "{{if .Count}}x{{end}}{{if .Missing}}y{{end}}{{if not .Ok}}z{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct Conditions {
    count: i64,
    ok: bool,
}

#[test]
fn test_condition_kinds() {
    let errors = errors(&Conditions::default());
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert!(errors[0].contains("field \"Count\" is not type bool: got int"));
    // an undefined condition field is reported once, by the field check
    assert!(errors[1].contains("field \"Missing\" not defined in type Conditions"));
}

#[derive(Model)]
#[tmpl(text = "{{if .Any}}a{{end}}{{if .Flag}}b{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct Dynamic {
    any: serde_json::Value,
    flag: serde_json::Value,
}

#[test]
fn test_dynamic_conditions() {
    let unknown = report(&Dynamic {
        any: serde_json::Value::Null,
        flag: serde_json::Value::Bool(true),
    });
    assert!(unknown.errors.is_empty(), "{:?}", unknown.errors);
    assert_eq!(unknown.warnings.len(), 1);
    assert!(unknown.warnings[0].contains("\"Any\""));

    let known = report(&Dynamic {
        any: serde_json::json!("text"),
        flag: serde_json::Value::Bool(false),
    });
    assert_eq!(known.errors.len(), 1);
    assert!(known.errors[0].contains("is not type bool: got string"));
}

#[derive(Model, Default)]
#[tmpl(text = "{{range .Items}}{{.Name}}{{.Nope}}{{$.Title}}{{else}}{{.Title}}{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct Listing {
    title: String,
    items: Vec<Entry>,
}

#[derive(Model, Default)]
#[tmpl(rename_all = "PascalCase")]
struct Entry {
    name: String,
}

#[test]
fn test_range_scopes_body_to_element() {
    let errors = errors(&Listing::default());
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].contains("field \"Nope\" not defined in type Entry"));
}

#[derive(Model, Default)]
#[tmpl(text = "{{range .ByKey}}{{.Name}}{{end}}{{with .Single}}{{.Name}}{{.Title}}{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct Scoped {
    by_key: BTreeMap<String, Entry>,
    single: Entry,
}

#[test]
fn test_map_range_and_with_scoping() {
    let errors = errors(&Scoped::default());
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].contains("field \"Title\" not defined in type Entry"));
}

#[derive(Model, Default)]
#[tmpl(text = "{{range .Title}}{{end}}{{range .Count}}{{.}}{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct BadRange {
    title: String,
    count: i64,
}

#[test]
fn test_range_over_scalar() {
    let errors = errors(&BadRange::default());
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].contains("cannot range over \"Title\" (type string)"));
}

#[derive(Model, Default)]
#[tmpl(
    text = "{{if eq .Count 1}}a{{end}}{{if eq .Count .Title}}b{{end}}{{if lt .Tags 2}}c{{end}}{{if eq .Ratio 2}}d{{end}}"
)]
#[tmpl(rename_all = "PascalCase")]
struct Compare {
    count: i64,
    ratio: f64,
    title: String,
    tags: Vec<String>,
}

#[test]
fn test_comparison_kinds() {
    let errors = errors(&Compare::default());
    assert_eq!(errors.len(), 3, "{:?}", errors);
    assert!(errors[0].contains("incompatible types for comparison"), "{}", errors[0]);
    assert!(errors[1].contains("invalid type for comparison: .Tags is slice"), "{}", errors[1]);
    // the engine never compares a float with an int
    assert!(
        errors[2].contains("incompatible types for comparison: .Ratio (float) and 2 (int)"),
        "{}",
        errors[2]
    );
}

#[derive(Model, Default)]
#[tmpl(text = "{{template \"Nav\" .Nav}}{{template \"ghost\" .}}{{template \"Nav\"}}")]
#[tmpl(rename_all = "PascalCase")]
struct Layout {
    nav: Nav,
}

#[derive(Model, Default)]
#[tmpl(text = "{{.Href}}{{.Label}}")]
#[tmpl(rename_all = "PascalCase")]
struct Nav {
    href: String,
}

#[test]
fn test_template_invocations() {
    let errors = errors(&Layout::default());
    assert_eq!(errors.len(), 3, "{:?}", errors);
    assert!(errors.iter().any(|e| e.starts_with("Nav:1:")
        && e.contains("field \"Label\" not defined in type Nav")));
    assert!(errors.iter().any(|e| e.contains(
        "template \"ghost\" is not provided by type Layout or any of its nested members"
    )));
    assert!(errors
        .iter()
        .any(|e| e.contains("template \"Nav\" is not invoked with a pipeline")));
}

#[derive(Model, Default)]
#[tmpl(text = "{{template \"item\" .item}}{{template \"item\" .Second}}")]
#[tmpl(rename_all = "PascalCase")]
struct Pair {
    #[tmpl(name = "item")]
    first: Cell,
    second: Cell,
}

#[derive(Model, Default)]
#[tmpl(text = "{{.Missing}}")]
struct Cell {}

#[test]
fn test_shared_fragment_reports_each_node_once() {
    let errors = errors(&Pair::default());
    assert_eq!(
        errors,
        vec!["item:1:3: field \"Missing\" not defined in type Cell".to_string()]
    );
}

#[derive(Model, Default)]
#[tmpl(text = "{{template \"outlet\" .}}")]
struct Shell {}

#[test]
fn test_outlet_is_always_defined() {
    assert!(errors(&Shell::default()).is_empty());
}

#[derive(Model, Default)]
#[tmpl(text = "{{template \"Children\" .Children}}")]
#[tmpl(rename_all = "PascalCase")]
struct Outline {
    label: String,
    children: Vec<Branch>,
}

#[derive(Model, Default)]
#[tmpl(text = "{{range .}}{{.Label}}{{template \"Children\" .Children}}{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct Branch {
    label: String,
    children: Vec<Branch>,
}

#[test]
fn test_recursive_templates_terminate() {
    let root = Outline {
        label: "root".to_string(),
        children: vec![Branch {
            label: "leaf".to_string(),
            children: Vec::new(),
        }],
    };
    let errors = errors(&root);
    assert!(errors.is_empty(), "{:?}", errors);
}

#[derive(Model, Default)]
#[tmpl(text = "{{shout .Title}} {{upper .Title}}")]
#[tmpl(rename_all = "PascalCase")]
struct Funcs {
    title: String,
}

#[test]
fn test_unknown_functions_warn() {
    let options = Options::default().with_func("upper", Function::new(|args| Ok(args[0].clone())));
    let report = analyze(&Funcs::default(), &options, &typing()).unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
    assert!(report.warnings[0].contains("function \"shout\" is not defined"));
}

fn register_shout(helper: &mut AnalysisHelper<'_>, _: &Value, node: NodeRef<'_>) {
    if let NodeRef::Identifier(ident) = node {
        if ident.name == "shout" && !helper.func_map().contains_key("shout") {
            helper.add_func("shout", Function::new(|args| Ok(args[0].clone())));
        }
    }
}

#[test]
fn test_custom_analyzers_register_functions() {
    let analyzers: Vec<Arc<dyn Analyzer>> = vec![Arc::new(register_shout), Arc::new(StaticTyping)];
    let report = analyze(&Funcs::default(), &Options::default(), &analyzers).unwrap();

    assert!(report.funcs.contains_key("shout"));
    // upper is neither configured nor registered here
    assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
    assert!(report.warnings[0].contains("\"upper\""));
}

#[test]
fn test_analyzer_sees_every_node_once() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let entered = Arc::new(AtomicUsize::new(0));
    let visited = Arc::new(AtomicUsize::new(0));

    struct Counter(Arc<AtomicUsize>, Arc<AtomicUsize>);
    impl Analyzer for Counter {
        fn enter(&self, _: &mut AnalysisHelper<'_>, _: &Value, _: NodeRef<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn visit(&self, _: &mut AnalysisHelper<'_>, _: &Value, _: NodeRef<'_>) {
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    let analyzers: Vec<Arc<dyn Analyzer>> =
        vec![Arc::new(Counter(Arc::clone(&entered), Arc::clone(&visited)))];
    analyze(&Undefined::default(), &Options::default(), &analyzers).unwrap();

    let entered = entered.load(Ordering::SeqCst);
    assert!(entered > 0);
    assert_eq!(entered, visited.load(Ordering::SeqCst));
}
