//! Render surface: outlet composition, recompilation and snapshot isolation

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use tmpl_core::config::consts::OUTLET;
use tmpl_core::{CompileError, Model, Options, RenderOption, Source, Template, TemplateProvider};

#[derive(Model)]
#[tmpl(text = "<p>{{.Body}}</p>")]
#[tmpl(rename_all = "PascalCase")]
struct Article {
    body: String,
    #[tmpl(name = "layout")]
    frame: Frame,
}

#[derive(Model, Default)]
#[tmpl(text = "<html>{{template \"outlet\" .}}</html>")]
struct Frame {}

fn article() -> Article {
    Article {
        body: "fish & chips".to_string(),
        frame: Frame::default(),
    }
}

#[test]
fn test_leaf_renders_alone() {
    let template = Template::new(article(), Options::default()).unwrap();
    let out = template.render_to_string(template.root(), &[]).unwrap();
    assert_eq!(out, "<p>fish &amp; chips</p>");
}

#[test]
fn test_outlet_composition() {
    let template = Template::new(article(), Options::default()).unwrap();
    let options = [
        RenderOption::Name(OUTLET.to_string()),
        RenderOption::Target("layout".to_string()),
    ];
    let out = template.render_to_string(template.root(), &options).unwrap();
    assert_eq!(out, "<html><p>fish &amp; chips</p></html>");
}

#[test]
fn test_layout_without_outlet_alias_fails_at_render() {
    let template = Template::new(article(), Options::default()).unwrap();
    let err = template
        .render_to_string(template.root(), &[RenderOption::Target("layout".to_string())])
        .unwrap_err();
    assert!(err.to_string().contains("no such template \"outlet\""), "{}", err);
}

/// Root whose template text can be swapped between compilations.
#[derive(Model)]
#[tmpl(provider)]
#[tmpl(rename_all = "PascalCase")]
struct Swappable {
    #[tmpl(skip)]
    text: Arc<Mutex<String>>,
    name: String,
}

impl TemplateProvider for Swappable {
    fn template_source(&self) -> Source {
        let text = self.text.lock().unwrap_or_else(|p| p.into_inner());
        Source::Text(text.clone())
    }
}

fn swappable(text: &str) -> (Template<Swappable>, Arc<Mutex<String>>) {
    let shared = Arc::new(Mutex::new(text.to_string()));
    let root = Swappable {
        text: Arc::clone(&shared),
        name: "x".to_string(),
    };
    (Template::new(root, Options::default()).unwrap(), shared)
}

#[test]
fn test_recompile_publishes_new_program() {
    let (template, text) = swappable("v1 {{.Name}}");
    *text.lock().unwrap() = "v2 {{.Name}}".to_string();

    // nothing changes until recompiled
    assert_eq!(template.render_to_string(template.root(), &[]).unwrap(), "v1 x");
    template.recompile().unwrap();
    assert_eq!(template.render_to_string(template.root(), &[]).unwrap(), "v2 x");
}

#[test]
fn test_failed_recompile_keeps_previous_program() {
    let (template, text) = swappable("ok {{.Name}}");
    let before = template.snapshot();

    *text.lock().unwrap() = "{{.Nope}}".to_string();
    let err = template.recompile().unwrap_err();
    assert!(matches!(err, CompileError::Analysis(_)));

    assert!(Arc::ptr_eq(&before, &template.snapshot()));
    assert_eq!(template.render_to_string(template.root(), &[]).unwrap(), "ok x");
}

#[test]
fn test_concurrent_renders_see_whole_snapshots() {
    let (template, text) = swappable("AAAA {{.Name}} AAAA");

    const NUM_READERS: usize = 8;
    let barrier = Arc::new(Barrier::new(NUM_READERS + 1));

    let readers: Vec<_> = (0..NUM_READERS)
        .map(|_| {
            let template = template.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    let out = template.render_to_string(template.root(), &[]).unwrap();
                    assert!(
                        out == "AAAA x AAAA" || out == "BBBB x BBBB",
                        "mixed output: {}",
                        out
                    );
                }
            })
        })
        .collect();

    barrier.wait();
    for i in 0..20 {
        let next = if i % 2 == 0 { "BBBB {{.Name}} BBBB" } else { "AAAA {{.Name}} AAAA" };
        *text.lock().unwrap() = next.to_string();
        template.recompile().unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
}
