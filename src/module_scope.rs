//! Module-level name resolution: imports, the default export, and top-level
//! bindings. Only the narrow resolution the extractors need; no control flow
//! is followed.

use oxc_ast::ast::{
    BindingPattern, Declaration, Expression, ImportDeclarationSpecifier, ModuleExportName,
    Program, Statement, VariableDeclaration,
};
use oxc_span::Span;
use std::collections::HashMap;

use crate::static_eval::unwrap_expression;

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Module specifier as written (`'../agent'`, `'@agentuity/runtime'`).
    pub source: String,
    /// Exported name for named imports; `None` for default and namespace imports.
    pub imported: Option<String>,
}

/// Locally bound name → the import that bound it.
#[derive(Debug, Clone, Default)]
pub struct ImportMap {
    entries: HashMap<String, ImportBinding>,
}

impl ImportMap {
    pub fn from_program(program: &Program<'_>) -> Self {
        let mut entries = HashMap::new();
        for stmt in &program.body {
            let Statement::ImportDeclaration(import_decl) = stmt else {
                continue;
            };
            let source = import_decl.source.value.to_string();
            let Some(specifiers) = &import_decl.specifiers else {
                continue;
            };
            for specifier in specifiers {
                let (local, imported) = match specifier {
                    ImportDeclarationSpecifier::ImportSpecifier(s) => (
                        s.local.name.to_string(),
                        Some(module_export_name(&s.imported).to_string()),
                    ),
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                        (s.local.name.to_string(), None)
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                        (s.local.name.to_string(), None)
                    }
                };
                entries.insert(
                    local,
                    ImportBinding {
                        source: source.clone(),
                        imported,
                    },
                );
            }
        }
        ImportMap { entries }
    }

    pub fn get(&self, local: &str) -> Option<&ImportBinding> {
        self.entries.get(local)
    }

    pub fn source_of(&self, local: &str) -> Option<&str> {
        self.entries.get(local).map(|b| b.source.as_str())
    }
}

pub fn module_export_name<'b>(name: &'b ModuleExportName<'_>) -> &'b str {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.as_str(),
        ModuleExportName::IdentifierReference(id) => id.name.as_str(),
        ModuleExportName::StringLiteral(s) => s.value.as_str(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEFAULT EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum DefaultExport<'b, 'a> {
    /// `export default name;` or `export { name as default };`
    Identifier { name: &'b str, span: Span },
    /// `export default <expression>;` for any non-identifier expression.
    Expression {
        expr: &'b Expression<'a>,
        stmt_index: usize,
        span: Span,
    },
    /// A function, class or interface declaration.
    Declaration { span: Span },
}

impl DefaultExport<'_, '_> {
    pub fn span(&self) -> Span {
        match self {
            DefaultExport::Identifier { span, .. }
            | DefaultExport::Expression { span, .. }
            | DefaultExport::Declaration { span } => *span,
        }
    }
}

pub fn find_default_export<'b, 'a>(program: &'b Program<'a>) -> Option<DefaultExport<'b, 'a>> {
    for (stmt_index, stmt) in program.body.iter().enumerate() {
        match stmt {
            Statement::ExportDefaultDeclaration(decl) => {
                let span = decl.span;
                return Some(match decl.declaration.as_expression().map(unwrap_expression) {
                    Some(Expression::Identifier(id)) => DefaultExport::Identifier {
                        name: id.name.as_str(),
                        span,
                    },
                    Some(expr) => DefaultExport::Expression {
                        expr,
                        stmt_index,
                        span,
                    },
                    None => DefaultExport::Declaration { span },
                });
            }
            Statement::ExportNamedDeclaration(decl) if decl.source.is_none() => {
                let aliased = decl
                    .specifiers
                    .iter()
                    .find(|s| module_export_name(&s.exported) == "default");
                if let Some(spec) = aliased {
                    return Some(DefaultExport::Identifier {
                        name: module_export_name(&spec.local),
                        span: decl.span,
                    });
                }
            }
            _ => {}
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOP-LEVEL BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Position of a top-level `const|let|var name = init` declarator, exported
/// or not.
#[derive(Debug)]
pub struct TopLevelBinding<'b, 'a> {
    pub stmt_index: usize,
    pub decl_index: usize,
    pub init: Option<&'b Expression<'a>>,
    pub span: Span,
    pub exported: bool,
}

fn statement_variables<'b, 'a>(stmt: &'b Statement<'a>) -> Option<(&'b VariableDeclaration<'a>, bool)> {
    match stmt {
        Statement::VariableDeclaration(var) => Some((&**var, false)),
        Statement::ExportNamedDeclaration(decl) => match &decl.declaration {
            Some(Declaration::VariableDeclaration(var)) => Some((&**var, true)),
            _ => None,
        },
        _ => None,
    }
}

fn statement_variables_mut<'b, 'a>(
    stmt: &'b mut Statement<'a>,
) -> Option<&'b mut VariableDeclaration<'a>> {
    match stmt {
        Statement::VariableDeclaration(var) => Some(&mut **var),
        Statement::ExportNamedDeclaration(decl) => match &mut decl.declaration {
            Some(Declaration::VariableDeclaration(var)) => Some(&mut **var),
            _ => None,
        },
        _ => None,
    }
}

pub fn binding_identifier<'b>(pattern: &'b BindingPattern<'_>) -> Option<&'b str> {
    match pattern {
        BindingPattern::BindingIdentifier(id) => Some(id.name.as_str()),
        _ => None,
    }
}

/// Every top-level declarator with a plain identifier binding, in order.
pub fn top_level_bindings<'b, 'a>(
    program: &'b Program<'a>,
) -> Vec<(&'b str, TopLevelBinding<'b, 'a>)> {
    let mut out = Vec::new();
    for (stmt_index, stmt) in program.body.iter().enumerate() {
        let Some((var, exported)) = statement_variables(stmt) else {
            continue;
        };
        for (decl_index, decl) in var.declarations.iter().enumerate() {
            if let Some(name) = binding_identifier(&decl.id) {
                out.push((
                    name,
                    TopLevelBinding {
                        stmt_index,
                        decl_index,
                        init: decl.init.as_ref(),
                        span: decl.span,
                        exported,
                    },
                ));
            }
        }
    }
    out
}

pub fn find_binding<'b, 'a>(program: &'b Program<'a>, name: &str) -> Option<TopLevelBinding<'b, 'a>> {
    top_level_bindings(program)
        .into_iter()
        .find(|(binding_name, _)| *binding_name == name)
        .map(|(_, binding)| binding)
}

/// Mutable initializer of the declarator at a position returned by
/// `top_level_bindings`.
pub fn binding_init_mut<'b, 'a>(
    program: &'b mut Program<'a>,
    stmt_index: usize,
    decl_index: usize,
) -> Option<&'b mut Expression<'a>> {
    let stmt = program.body.get_mut(stmt_index)?;
    let var = statement_variables_mut(stmt)?;
    var.declarations.get_mut(decl_index)?.init.as_mut()
}

// ═══════════════════════════════════════════════════════════════════════════════
// RELATIVE IMPORT RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

const RESOLVE_EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];

/// Root-relative directory of a root-relative filename (`""` at the root).
pub fn parent_dir(filename: &str) -> &str {
    filename.rfind('/').map(|i| &filename[..i]).unwrap_or("")
}

/// Joins `dir` and a relative `specifier`, folding `.` and `..` segments.
/// Returns `None` when the specifier climbs above the root.
pub fn join_relative(dir: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Candidate root-relative files an import specifier may refer to, in lookup
/// order. Bare (package) specifiers have no candidates.
pub fn resolve_relative_import(importer: &str, specifier: &str) -> Vec<String> {
    if !specifier.starts_with('.') {
        return Vec::new();
    }
    let Some(base) = join_relative(parent_dir(importer), specifier) else {
        return Vec::new();
    };

    let mut candidates = vec![base.clone()];
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.ends_with('/') && !ext.contains('/') => (stem, Some(ext)),
        _ => (base.as_str(), None),
    };

    // ESM-style TypeScript imports spell the emitted `.js` extension.
    if matches!(ext, Some("js") | Some("jsx")) {
        candidates.push(format!("{}.ts", stem));
        candidates.push(format!("{}.tsx", stem));
    }
    if !matches!(ext, Some(e) if RESOLVE_EXTENSIONS.contains(&e)) {
        for ext in RESOLVE_EXTENSIONS {
            candidates.push(format!("{}.{}", base, ext));
        }
    }
    for ext in RESOLVE_EXTENSIONS {
        candidates.push(format!("{}/index.{}", base, ext));
    }
    candidates
}
