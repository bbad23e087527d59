//! End-to-end compilation: discovery, parsing and static checks over derived models

use tmpl_core::{CompileError, Compiler, EscapeMode, Model, Options, Source, TemplateProvider};
use tmpl_testkit::{temp_dir_in_workspace, write_template};

fn plain() -> Options {
    Options::default().with_escape(EscapeMode::None)
}

fn render<T: Model>(root: &T) -> String {
    let program = Compiler::new(plain()).compile(root).unwrap();
    let mut out = String::new();
    program.execute(None, &root.to_value(), &mut out).unwrap();
    out
}

fn diagnostics<T: Model>(root: &T) -> Vec<String> {
    match Compiler::new(plain()).compile(root) {
        Ok(_) => panic!("expected compilation to fail"),
        Err(err) => err.diagnostics().to_vec(),
    }
}

#[derive(Model)]
#[tmpl(text = "Hello, {{.Name}}!")]
#[tmpl(rename_all = "PascalCase")]
struct Greeting {
    name: String,
}

#[test]
fn test_hello_world() {
    let root = Greeting {
        name: "World".to_string(),
    };
    assert_eq!(render(&root), "Hello, World!");
}

#[derive(Model)]
#[tmpl(text = "{{template \"Header\" .Header}}|{{template \"Footer\" .Footer}}")]
#[tmpl(rename_all = "PascalCase")]
struct Document {
    header: Header,
    footer: Footer,
}

#[derive(Model)]
#[tmpl(text = "<h1>{{.Title}}</h1>")]
#[tmpl(rename_all = "PascalCase")]
struct Header {
    title: String,
}

#[derive(Model)]
#[tmpl(text = "<small>{{.Note}}</small>")]
#[tmpl(rename_all = "PascalCase")]
struct Footer {
    note: String,
}

#[test]
fn test_nested_text_components() {
    let root = Document {
        header: Header {
            title: "Top".to_string(),
        },
        footer: Footer {
            note: "Bottom".to_string(),
        },
    };
    assert_eq!(render(&root), "<h1>Top</h1>|<small>Bottom</small>");
}

#[derive(Model, Default)]
#[tmpl(text = "{{template \"Sidebar\" .}}")]
struct UndefinedTemplate {}

#[test]
fn test_undefined_template() {
    let errors = diagnostics(&UndefinedTemplate::default());
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0],
        "UndefinedTemplate:1:3: template \"Sidebar\" is not provided by type UndefinedTemplate or any of its nested members"
    );
}

#[derive(Model, Default)]
#[tmpl(text = "{{.Message}}")]
struct UndefinedField {}

#[test]
fn test_undefined_field() {
    let errors = diagnostics(&UndefinedField::default());
    assert_eq!(
        errors,
        vec!["UndefinedField:1:3: field \"Message\" not defined in type UndefinedField".to_string()]
    );
}

#[derive(Model)]
#[tmpl(text = "{{ if .DefIf }}{{ .Message }}{{ end }}")]
#[tmpl(rename_all = "PascalCase")]
struct DefinedIf {
    def_if: bool,
    message: String,
}

#[derive(Model, Default)]
#[tmpl(text = "{{ if .DefIf }}{{ .Message }}{{ end }}")]
#[tmpl(rename_all = "PascalCase")]
struct IntIf {
    def_if: i32,
    message: String,
}

#[derive(Model, Default)]
#[tmpl(text = "{{ if .UndefIf }}x{{ end }}")]
struct UndefinedIf {}

#[test]
fn test_if_conditions() {
    let root = DefinedIf {
        def_if: true,
        message: "Hello World".to_string(),
    };
    assert_eq!(render(&root), "Hello World");

    let errors = diagnostics(&IntIf::default());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("field \"DefIf\" is not type bool: got int"), "{}", errors[0]);

    let errors = diagnostics(&UndefinedIf::default());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("field \"UndefIf\" not defined in type UndefinedIf"));
}

#[derive(Model)]
#[tmpl(text = "{{ with .Any }}{{ .Name }}{{ end }}{{ if .On }}!{{ end }}")]
#[tmpl(rename_all = "PascalCase")]
struct AnyType {
    any: serde_json::Value,
    on: serde_json::Value,
}

#[test]
fn test_dynamic_members_follow_runtime_value() {
    let root = AnyType {
        any: serde_json::json!({"Name": "dynamic"}),
        on: serde_json::Value::Bool(true),
    };
    assert_eq!(render(&root), "dynamic!");

    let unknown = AnyType {
        any: serde_json::Value::Null,
        on: serde_json::Value::Null,
    };
    let report =
        tmpl_core::analyze(&unknown, &plain(), &Compiler::default_analyzers()).unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("\"On\""));
}

#[derive(Model, Default)]
#[tmpl(text = "{{.A}}\n{{.B}}\n{{range .Items}}{{.C}}{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct ManyErrors {
    items: Vec<Row>,
}

#[derive(Model, Default)]
#[tmpl(rename_all = "PascalCase")]
struct Row {
    label: String,
}

#[test]
fn test_every_error_is_reported() {
    let err = Compiler::new(plain())
        .compile(&ManyErrors::default())
        .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("failed to compile template: "));
    assert_eq!(err.diagnostics().len(), 3);
    assert!(err.diagnostics()[0].starts_with("ManyErrors:1:3:"));
    assert!(err.diagnostics()[1].starts_with("ManyErrors:2:3:"));
    assert!(err.diagnostics()[2].contains("field \"C\" not defined in type Row"));
}

#[derive(Model)]
#[tmpl(text = "{{range $i, $row := .Items}}{{$i}}={{$row.Label}}{{.Label}};{{end}}")]
#[tmpl(rename_all = "PascalCase")]
struct Iteration {
    items: Vec<Row>,
}

#[test]
fn test_iteration_scopes() {
    let root = Iteration {
        items: vec![
            Row {
                label: "a".to_string(),
            },
            Row {
                label: "b".to_string(),
            },
        ],
    };
    assert_eq!(render(&root), "0=aa;1=bb;");
}

#[derive(Model)]
#[tmpl(text = "{{.Author}} wrote {{.Title}}")]
#[tmpl(rename_all = "PascalCase")]
struct Post {
    #[tmpl(embed)]
    meta: Meta,
    title: String,
}

#[derive(Model)]
#[tmpl(rename_all = "PascalCase")]
struct Meta {
    author: String,
}

#[test]
fn test_embedded_members() {
    let root = Post {
        meta: Meta {
            author: "Ada".to_string(),
        },
        title: "Notes".to_string(),
    };
    assert_eq!(render(&root), "Ada wrote Notes");
}

#[derive(Model)]
#[tmpl(provider)]
#[tmpl(rename_all = "PascalCase")]
struct FromDisk {
    #[tmpl(skip)]
    path: std::path::PathBuf,
    title: String,
}

impl TemplateProvider for FromDisk {
    fn template_source(&self) -> Source {
        Source::File(self.path.clone())
    }
}

#[test]
fn test_file_sources_and_options_file() {
    let temp = temp_dir_in_workspace();
    let path = write_template(temp.path(), "page.html", "[[ .Title ]] {{ literal }}");
    let config = write_template(
        temp.path(),
        "tmpl.toml",
        "[delimiters]\nleft = \"[[\"\nright = \"]]\"\n\n[render]\nescape = \"none\"\n",
    );

    let options = Options::load(&config).unwrap();
    let root = FromDisk {
        path,
        title: "A&B".to_string(),
    };
    let program = Compiler::new(options).compile(&root).unwrap();
    let mut out = String::new();
    program.execute(None, &root.to_value(), &mut out).unwrap();
    assert_eq!(out, "A&B {{ literal }}");
}

#[test]
fn test_missing_file_source() {
    let temp = temp_dir_in_workspace();
    let root = FromDisk {
        path: temp.path().join("missing.html"),
        title: String::new(),
    };
    let err = Compiler::new(plain()).compile(&root).unwrap_err();
    assert!(matches!(err, CompileError::Source { .. }));
    assert!(err.to_string().contains("missing.html"));
}

#[derive(Model, Default)]
struct NoSource {}

#[test]
fn test_root_without_source() {
    let err = Compiler::new(plain()).compile(&NoSource::default()).unwrap_err();
    assert!(matches!(err, CompileError::MissingSource { type_name } if type_name == "NoSource"));
}

#[derive(Model, Default)]
#[tmpl(text = "{{if .A}}")]
struct Broken {}

#[test]
fn test_syntax_errors_abort() {
    let err = Compiler::new(plain()).compile(&Broken::default()).unwrap_err();
    match err {
        CompileError::Syntax(syntax) => {
            assert_eq!(syntax.name, "Broken");
            assert!(syntax.message.contains("unexpected EOF"), "{}", syntax.message);
        }
        other => panic!("Expected Syntax error, got {:?}", other),
    }
}
