//! Compilation pipeline
//!
//! schema → discovery → parse forest → analysis → [`CompiledProgram`]. Every
//! stage runs from scratch on each pass; nothing is cached between passes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analyze::{self, AnalysisReport, Analyzer, StaticTyping};
use crate::config::Options;
use crate::discover::discover;
use crate::error::{AnalysisErrors, CompileError};
use crate::forest::ParseForest;
use crate::model::Model;
use crate::program::CompiledProgram;
use crate::schema::SchemaTree;

/// Output of the analysis stages of one pass.
pub(crate) struct Checked {
    pub forest: ParseForest,
    pub report: AnalysisReport,
}

/// Runs schema building, discovery, parsing and analysis. Fatal errors abort
/// immediately; analysis findings are returned in the report.
pub(crate) fn check<T: Model>(
    root: &T,
    options: &Options,
    analyzers: &[Arc<dyn Analyzer>],
) -> Result<Checked, CompileError> {
    let schema = SchemaTree::build(root)?;
    let discovery = discover(root)?;

    let mut forest = ParseForest::new(options.delimiters.clone());
    for (i, fragment) in discovery.fragments.iter().enumerate() {
        forest.parse(&fragment.name, &fragment.text, i == 0)?;
    }
    debug!(
        entry = forest.entry(),
        trees = forest.trees().len(),
        "parsed fragments"
    );

    let report = analyze::run(&forest, &schema, options, &root.to_value(), analyzers);
    Ok(Checked { forest, report })
}

/// Compiles models into [`CompiledProgram`]s with a fixed option set and
/// analyzer list.
#[derive(Clone)]
pub struct Compiler {
    options: Options,
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("options", &self.options)
            .field("analyzers", &self.analyzers.len())
            .finish()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Compiler {
    /// A compiler running [`Compiler::default_analyzers`].
    pub fn new(options: Options) -> Self {
        Self::with_analyzers(options, Self::default_analyzers())
    }

    pub fn with_analyzers(options: Options, analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        Self { options, analyzers }
    }

    pub fn default_analyzers() -> Vec<Arc<dyn Analyzer>> {
        vec![Arc::new(StaticTyping)]
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn analyzers(&self) -> &[Arc<dyn Analyzer>] {
        &self.analyzers
    }

    /// One full compilation pass over `root`.
    ///
    /// No program is produced if any analysis error remains; with
    /// `deny_warnings`, warnings count as errors.
    pub fn compile<T: Model>(&self, root: &T) -> Result<CompiledProgram, CompileError> {
        let Checked { forest, report } = check(root, &self.options, &self.analyzers)?;
        let AnalysisReport {
            mut errors,
            warnings,
            funcs: registered,
        } = report;

        if self.options.analysis.deny_warnings {
            errors.extend(warnings);
        } else {
            for warning in &warnings {
                warn!(warning = %warning, "template analysis warning");
            }
        }
        if !errors.is_empty() {
            debug!(errors = errors.len(), "analysis failed");
            return Err(CompileError::Analysis(AnalysisErrors::new(errors)));
        }

        let (entry, trees) = forest.into_parts();
        let mut funcs = self.options.funcs.clone();
        funcs.extend(registered);

        info!(entry = %entry, templates = trees.len(), "compiled template");
        Ok(CompiledProgram::new(
            entry,
            trees,
            funcs,
            self.options.render.escape,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Model;
    use crate::model::Value;
    use crate::template::Function;

    #[derive(Model)]
    #[tmpl(text = "Hello, {{.Name}}!")]
    #[tmpl(rename_all = "PascalCase")]
    struct Hello {
        name: String,
    }

    #[derive(Model, Default)]
    #[tmpl(text = "{{.A}}{{.B}}{{.C}}")]
    struct ThreeMissing {}

    #[derive(Model, Default)]
    #[tmpl(text = "{{shout \"x\"}}")]
    struct Shouting {}

    fn render(program: &CompiledProgram, data: &Value) -> String {
        let mut out = String::new();
        program.execute(None, data, &mut out).unwrap();
        out
    }

    #[test]
    fn test_hello_world() {
        let root = Hello {
            name: "World".to_string(),
        };
        let program = Compiler::default().compile(&root).unwrap();
        assert_eq!(program.entry(), "Hello");
        assert_eq!(render(&program, &root.to_value()), "Hello, World!");
    }

    #[test]
    fn test_all_analysis_errors_are_collected() {
        let err = Compiler::default()
            .compile(&ThreeMissing::default())
            .unwrap_err();
        assert_eq!(err.diagnostics().len(), 3);
        assert!(err.to_string().starts_with("failed to compile template: "));
    }

    #[test]
    fn test_warnings_do_not_fail_by_default() {
        let compiler = Compiler::new(Options::default().with_func(
            "shout",
            Function::new(|args| Ok(args[0].clone())),
        ));
        assert!(compiler.compile(&Shouting::default()).is_ok());

        assert!(Compiler::default().compile(&Shouting::default()).is_ok());
    }

    #[test]
    fn test_deny_warnings() {
        let compiler = Compiler::new(Options::default().deny_warnings(true));
        let err = compiler.compile(&Shouting::default()).unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
        assert!(err.diagnostics()[0].contains("function \"shout\" is not defined"));
    }

    #[test]
    fn test_without_analyzers_everything_compiles() {
        let compiler = Compiler::with_analyzers(Options::default(), Vec::new());
        assert!(compiler.compile(&ThreeMissing::default()).is_ok());
    }
}
