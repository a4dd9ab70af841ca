//! Resolution of the callable behind `handler` and each `actions` entry.
//!
//! Indirection is unwrapped until a function is reached:
//! - function declarations, function expressions and arrows are terminal
//! - a variable follows its initializer
//! - a call follows its first argument (`withAuth(fn)`)
//! - an identifier re-resolves that name in module scope
//!
//! Every name visited is recorded so aliasing loops surface as
//! [`ExtractError::ResolutionCycle`] instead of overflowing the stack.

use crate::ast::{Binding, Expr, FunctionSig, Module, ObjectProp};
use crate::error::{ExtractError, Result};

pub struct Locator<'m> {
    module: &'m Module,
}

impl<'m> Locator<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self { module }
    }

    /// Resolve the function a module-scope name ultimately refers to.
    pub fn resolve_function(&self, name: &str) -> Result<Option<&'m FunctionSig>> {
        self.function_by_name(name, &mut Vec::new())
    }

    /// Resolve the function an expression ultimately refers to.
    pub fn resolve_expr(&self, expr: &'m Expr) -> Result<Option<&'m FunctionSig>> {
        self.function_by_expr(expr, &mut Vec::new())
    }

    /// Resolve a name to the object literal it is initialised with,
    /// following identifiers and first call arguments
    /// (`export const actions = defineActions({ ... })`).
    pub fn resolve_object(&self, name: &str) -> Result<Option<&'m [ObjectProp]>> {
        self.object_by_name(name, &mut Vec::new())
    }

    fn visit(chain: &mut Vec<String>, name: &str) -> Result<()> {
        let looped = chain.iter().any(|n| n == name);
        chain.push(name.to_string());
        if looped {
            return Err(ExtractError::ResolutionCycle {
                name: chain[0].clone(),
                cycle: chain.join(" -> "),
            });
        }
        Ok(())
    }

    fn function_by_name(
        &self,
        name: &str,
        chain: &mut Vec<String>,
    ) -> Result<Option<&'m FunctionSig>> {
        Self::visit(chain, name)?;
        let module: &'m Module = self.module;
        match module.binding(name) {
            Some(Binding::Function(f)) => Ok(Some(&f.sig)),
            Some(Binding::Variable(v)) => match &v.init {
                Some(init) => self.function_by_expr(init, chain),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn function_by_expr(
        &self,
        expr: &'m Expr,
        chain: &mut Vec<String>,
    ) -> Result<Option<&'m FunctionSig>> {
        match expr {
            Expr::Function(sig) => Ok(Some(sig)),
            Expr::Call { args, .. } => match args.first() {
                Some(first) => self.function_by_expr(first, chain),
                None => Ok(None),
            },
            Expr::Ident(name) => self.function_by_name(name, chain),
            _ => Ok(None),
        }
    }

    fn object_by_name(
        &self,
        name: &str,
        chain: &mut Vec<String>,
    ) -> Result<Option<&'m [ObjectProp]>> {
        Self::visit(chain, name)?;
        let module: &'m Module = self.module;
        match module.binding(name) {
            Some(Binding::Variable(v)) => match &v.init {
                Some(init) => self.object_by_expr(init, chain),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn object_by_expr(
        &self,
        expr: &'m Expr,
        chain: &mut Vec<String>,
    ) -> Result<Option<&'m [ObjectProp]>> {
        match expr {
            Expr::Object(props) => Ok(Some(props)),
            Expr::Call { args, .. } => match args.first() {
                Some(first) => self.object_by_expr(first, chain),
                None => Ok(None),
            },
            Expr::Ident(name) => self.object_by_name(name, chain),
            _ => Ok(None),
        }
    }
}
