//! Functions: named collections of computations, buffers, and invariants.
//!
//! A function moves through two lifecycle phases. While *unfrozen*,
//! entities are declared and schedules transformed. The first call to
//! [`Function::align_schedules`] (directly or through AST generation)
//! freezes it: from then on only queries, lowering, and dumps are
//! permitted, and [`Function::computation_mut`] refuses access.

use crate::codegen::c::emit_c;
use crate::codegen::{ElementType, Expr, IrBuilder, Stmt, StmtBuilder};
use crate::ir::buffer::{ArgumentKind, Buffer};
use crate::ir::computation::Computation;
use crate::ir::invariant::Invariant;
use crate::lower;
use crate::options::{default_options, Options};
use crate::polyhedral::ast_build::{self, AstNode, AstStatement};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::UnionMap;
use crate::polyhedral::set::UnionSet;
use crate::polyhedral::Context;
use crate::utils::errors::{Error, Result};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// A function under construction: computations, buffers, invariants, and
/// the products of lowering.
#[derive(Debug)]
pub struct Function {
    name: String,
    options: Options,
    ctx: Context,
    arguments: Vec<String>,
    buffers: BTreeMap<String, Buffer>,
    invariants: Vec<Invariant>,
    computations: Vec<Computation>,
    parallel_dimensions: HashMap<String, usize>,
    vector_dimensions: HashMap<String, usize>,
    frozen: bool,
    ast: Option<AstNode>,
    stmt: Option<Stmt>,
}

impl Function {
    /// Create a function with the process-wide default options.
    pub fn new(name: &str) -> Result<Self> {
        Self::with_options(name, default_options())
    }

    /// Create a function with explicit options.
    pub fn with_options(name: &str, options: Options) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidInput("empty function name".to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            options,
            ctx: Context::new(),
            arguments: Vec::new(),
            buffers: BTreeMap::new(),
            invariants: Vec::new(),
            computations: Vec::new(),
            parallel_dimensions: HashMap::new(),
            vector_dimensions: HashMap::new(),
            frozen: false,
            ast: None,
            stmt: None,
        })
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The options captured at construction.
    pub fn options(&self) -> Options {
        self.options
    }

    /// The algebra context (registered parameter names).
    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// Argument buffer names, in declaration order.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    fn ensure_unfrozen(&self, what: &str) -> Result<()> {
        if self.frozen {
            return Err(Error::PhaseViolation(format!(
                "{} on frozen function `{}`",
                what, self.name
            )));
        }
        Ok(())
    }

    fn ensure_unique_name(&self, name: &str) -> Result<()> {
        let clash = self.buffers.contains_key(name)
            || self.computations.iter().any(|c| c.name() == name)
            || self.invariants.iter().any(|i| i.name() == name);
        if clash {
            return Err(Error::InvalidInput(format!(
                "name `{}` is already used in function `{}`",
                name, self.name
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Declaration
    // ------------------------------------------------------------------

    /// Declare a buffer. `Input` and `Output` buffers become function
    /// arguments in declaration order; `Internal` buffers do not.
    pub fn add_buffer(
        &mut self,
        name: &str,
        dim_sizes: Vec<i64>,
        element_type: ElementType,
        kind: ArgumentKind,
    ) -> Result<()> {
        self.ensure_unfrozen("buffer declaration")?;
        self.ensure_unique_name(name)?;
        let buffer = Buffer::new(name, dim_sizes, element_type, kind)?;
        if !matches!(kind, ArgumentKind::Internal) {
            self.arguments.push(name.to_string());
        }
        self.buffers.insert(name.to_string(), buffer);
        Ok(())
    }

    /// Look up a buffer.
    pub fn buffer(&self, name: &str) -> Option<&Buffer> {
        self.buffers.get(name)
    }

    /// Declare an invariant; its name becomes usable as a symbolic
    /// parameter in iteration-space and access text.
    pub fn add_invariant(&mut self, name: &str, expr: Expr) -> Result<()> {
        self.ensure_unfrozen("invariant declaration")?;
        self.ensure_unique_name(name)?;
        let invariant = Invariant::new(name, expr)?;
        self.ctx.add_parameter(name);
        self.invariants.push(invariant);
        Ok(())
    }

    /// Declared invariants.
    pub fn invariants(&self) -> &[Invariant] {
        &self.invariants
    }

    /// Declare a computation over `iteration_space` (ISL set text). The
    /// tuple name of the set becomes the computation's name. Pass
    /// `schedulable = false` for a wrapper that only names a read; it
    /// carries no body and is skipped by lowering.
    pub fn add_computation(
        &mut self,
        iteration_space: &str,
        body: Option<Expr>,
        schedulable: bool,
        element_type: ElementType,
    ) -> Result<String> {
        self.ensure_unfrozen("computation declaration")?;
        let computation = Computation::new(
            iteration_space,
            body,
            schedulable,
            element_type,
            self.ctx.parameters(),
            self.options.auto_data_mapping,
        )?;
        self.ensure_unique_name(computation.name())?;
        let name = computation.name().to_string();
        self.computations.push(computation);
        Ok(name)
    }

    /// Look up a computation.
    pub fn computation(&self, name: &str) -> Result<&Computation> {
        self.computations
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "no computation `{}` in function `{}`",
                    name, self.name
                ))
            })
    }

    /// Mutable access to a computation for schedule transformations and
    /// binding. Fails with a phase violation once the function is frozen.
    pub fn computation_mut(&mut self, name: &str) -> Result<&mut Computation> {
        self.ensure_unfrozen("transformation")?;
        let fn_name = self.name.clone();
        self.computations
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| {
                Error::InvalidInput(format!("no computation `{}` in function `{}`", name, fn_name))
            })
    }

    /// All computations, in declaration order.
    pub fn computations(&self) -> &[Computation] {
        &self.computations
    }

    /// Bind a computation one-to-one to a buffer.
    pub fn bind_to(&mut self, computation: &str, buffer: &str) -> Result<()> {
        self.ensure_unfrozen("binding")?;
        let buffer = self
            .buffers
            .get(buffer)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "no buffer `{}` in function `{}`",
                    buffer, self.name
                ))
            })?
            .clone();
        self.computation_mut(computation)?.bind_to(&buffer)
    }

    /// Set a computation's access relation from ISL map text.
    pub fn set_access(&mut self, computation: &str, access_str: &str) -> Result<()> {
        self.ensure_unfrozen("binding")?;
        let params = self.ctx.parameters().to_vec();
        self.computation_mut(computation)?
            .set_access(access_str, &params)
    }

    // ------------------------------------------------------------------
    // Ordering and tags
    // ------------------------------------------------------------------

    /// Schedule `computation` to run after `other` at the given depth of
    /// the time-processor space ([`Computation::ROOT_DIMENSION`] for the
    /// root). Both schedules are padded to a common range dimensionality
    /// first, then an ordering dimension is inserted at `depth + 1` with
    /// value 0 for `other` and 1 for `computation`.
    pub fn after(&mut self, computation: &str, other: &str, depth: i32) -> Result<()> {
        self.ensure_unfrozen("ordering")?;
        if depth < Computation::ROOT_DIMENSION {
            return Err(Error::InvalidInput(format!(
                "after depth must be >= {}, got {}",
                Computation::ROOT_DIMENSION,
                depth
            )));
        }
        if computation == other {
            return Err(Error::InvalidInput(format!(
                "cannot order `{}` after itself",
                computation
            )));
        }
        let this_idx = self.computation_index(computation)?;
        let other_idx = self.computation_index(other)?;

        let max_range = self.computations[this_idx]
            .schedule()
            .n_out()
            .max(self.computations[other_idx].schedule().n_out());
        self.computations[this_idx].pad_schedule_to(max_range);
        self.computations[other_idx].pad_schedule_to(max_range);

        let pos = (depth + 1) as usize;
        if pos > max_range {
            return Err(Error::DimensionalityMismatch(format!(
                "after depth {} exceeds the schedule range dimensionality {}",
                depth, max_range
            )));
        }
        self.computations[other_idx].insert_order_dim(pos, 0);
        self.computations[this_idx].insert_order_dim(pos, 1);
        Ok(())
    }

    fn computation_index(&self, name: &str) -> Result<usize> {
        self.computations
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "no computation `{}` in function `{}`",
                    name, self.name
                ))
            })
    }

    /// Tag the loop level `level` (0 = outermost) of a computation to be
    /// parallelized. Tagging the same computation at a different level is
    /// rejected.
    pub fn tag_parallel_dimension(&mut self, computation: &str, level: usize) -> Result<()> {
        self.ensure_unfrozen("tagging")?;
        self.computation(computation)?;
        Self::insert_tag(&mut self.parallel_dimensions, computation, level, "parallel")
    }

    /// Tag the loop level `level` (0 = outermost) of a computation to be
    /// vectorized. Tagging the same computation at a different level is
    /// rejected.
    pub fn tag_vector_dimension(&mut self, computation: &str, level: usize) -> Result<()> {
        self.ensure_unfrozen("tagging")?;
        self.computation(computation)?;
        Self::insert_tag(&mut self.vector_dimensions, computation, level, "vector")
    }

    fn insert_tag(
        map: &mut HashMap<String, usize>,
        computation: &str,
        level: usize,
        what: &str,
    ) -> Result<()> {
        match map.get(computation) {
            Some(&existing) if existing != level => Err(Error::InvalidInput(format!(
                "computation `{}` already has a {} tag at level {}",
                computation, what, existing
            ))),
            _ => {
                map.insert(computation.to_string(), level);
                Ok(())
            }
        }
    }

    /// True when `computation` should be parallelized at loop `level`.
    pub fn should_parallelize(&self, computation: &str, level: usize) -> bool {
        self.parallel_dimensions.get(computation) == Some(&level)
    }

    /// True when `computation` should be vectorized at loop `level`.
    pub fn should_vectorize(&self, computation: &str, level: usize) -> bool {
        self.vector_dimensions.get(computation) == Some(&level)
    }

    // ------------------------------------------------------------------
    // Alignment and the time-processor domain
    // ------------------------------------------------------------------

    /// Maximum schedule range dimensionality across all computations.
    pub fn get_max_schedules_range_dim(&self) -> usize {
        self.computations
            .iter()
            .map(|c| c.schedule().n_out())
            .max()
            .unwrap_or(0)
    }

    /// Pad every schedule's range with zero-valued dimensions until all
    /// ranges share the maximum dimensionality. Freezes the function; no
    /// further transformations are permitted afterwards. Idempotent.
    pub fn align_schedules(&mut self) -> Result<()> {
        let max = self.get_max_schedules_range_dim();
        for c in &mut self.computations {
            c.pad_schedule_to(max);
        }
        self.frozen = true;
        Ok(())
    }

    /// Compute every computation's time-processor domain by applying its
    /// schedule to its iteration domain. Aligns (and freezes) first.
    /// Idempotent.
    pub fn gen_time_processor_domain(&mut self) -> Result<()> {
        self.align_schedules()?;
        for c in &mut self.computations {
            c.gen_time_processor_domain()?;
        }
        Ok(())
    }

    /// Union of all iteration domains.
    pub fn get_iteration_domain(&self) -> UnionSet {
        let mut union = UnionSet::default();
        for c in &self.computations {
            union.add(c.iteration_domain().clone());
        }
        union
    }

    /// Union of all schedules.
    pub fn get_schedule(&self) -> UnionMap {
        let mut union = UnionMap::default();
        for c in &self.computations {
            union.add(c.schedule().clone());
        }
        union
    }

    /// Union of all time-processor domains; empty until
    /// [`Function::gen_time_processor_domain`] runs.
    pub fn get_time_processor_domain(&self) -> UnionSet {
        let mut union = UnionSet::default();
        for c in &self.computations {
            if let Some(tp) = c.time_processor_domain() {
                union.add(tp.clone());
            }
        }
        union
    }

    // ------------------------------------------------------------------
    // Lowering
    // ------------------------------------------------------------------

    /// Generate (and cache) the polyhedral loop AST for the function's
    /// schedulable computations.
    pub fn gen_ast(&mut self) -> Result<&AstNode> {
        if self.ast.is_none() {
            self.gen_time_processor_domain()?;
            let mut statements = Vec::new();
            for c in &self.computations {
                if !c.is_schedulable() {
                    continue;
                }
                let time = c
                    .time_processor_domain()
                    .expect("time-processor domain generated above")
                    .clone();
                let schedule = c.schedule();
                let n_in = schedule.n_in();
                let pullback: Vec<AffineExpr> = schedule
                    .solve_inputs()?
                    .into_iter()
                    .map(|e| {
                        let mut param_coeffs = e.param_coeffs.clone();
                        param_coeffs.resize(time.params.len(), 0);
                        AffineExpr {
                            constant: e.constant,
                            coeffs: e.coeffs[n_in..].to_vec(),
                            param_coeffs,
                        }
                    })
                    .collect();
                statements.push(AstStatement {
                    name: c.name().to_string(),
                    time,
                    pullback,
                });
            }
            self.ast = Some(ast_build::build(&statements)?);
        }
        Ok(self.ast.as_ref().expect("cached above"))
    }

    /// Lower the function through a custom statement builder.
    pub fn lower_with<B: StmtBuilder>(&mut self, builder: &mut B) -> Result<B::Stmt> {
        let ast = self.gen_ast()?.clone();
        lower::emit(self, &ast, builder)
    }

    /// Lower the function to (and cache) the default statement tree.
    pub fn gen_stmt(&mut self) -> Result<&Stmt> {
        if self.stmt.is_none() {
            let stmt = self.lower_with(&mut IrBuilder)?;
            self.stmt = Some(stmt);
        }
        Ok(self.stmt.as_ref().expect("cached above"))
    }

    /// Lower and render the function as C text.
    pub fn gen_c_code(&mut self) -> Result<String> {
        let stmt = self.gen_stmt()?;
        Ok(emit_c(stmt))
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Dump every iteration domain on standard output.
    pub fn dump_iteration_domain(&self) {
        println!("{}", self.get_iteration_domain());
    }

    /// Dump every schedule on standard output.
    pub fn dump_schedule(&self) {
        println!("{}", self.get_schedule());
    }

    /// Dump the time-processor domain on standard output.
    pub fn dump_time_processor_domain(&self) {
        let union = self.get_time_processor_domain();
        if union.is_empty() {
            println!("(null)");
        } else {
            println!("{}", union);
        }
    }

    /// Dump most fields on standard output.
    pub fn dump(&self) {
        println!("function {}", self.name);
        println!("  arguments: {:?}", self.arguments);
        for c in &self.computations {
            c.dump();
        }
        match &self.stmt {
            Some(stmt) => println!("  lowered:\n{}", emit_c(stmt)),
            None => println!("  lowered: (null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_comp_function() -> Function {
        let mut f = Function::new("f").unwrap();
        f.add_computation(
            "{ A[i] : 0 <= i < 8 }",
            Some(Expr::int(1)),
            true,
            ElementType::I32,
        )
        .unwrap();
        f.add_computation(
            "{ B[i, j] : 0 <= i < 4 and 0 <= j < 4 }",
            Some(Expr::int(2)),
            true,
            ElementType::I32,
        )
        .unwrap();
        f
    }

    #[test]
    fn test_name_validation() {
        assert!(Function::new("").is_err());
        let mut f = Function::new("f").unwrap();
        f.add_buffer("b", vec![8], ElementType::I32, ArgumentKind::Output)
            .unwrap();
        // Names are unique across entity kinds.
        assert!(f
            .add_computation("{ b[i] : 0 <= i < 8 }", Some(Expr::int(0)), true, ElementType::I32)
            .is_err());
    }

    #[test]
    fn test_internal_buffers_are_not_arguments() {
        let mut f = Function::new("f").unwrap();
        f.add_buffer("in", vec![8], ElementType::I32, ArgumentKind::Input)
            .unwrap();
        f.add_buffer("tmp", vec![8], ElementType::I32, ArgumentKind::Internal)
            .unwrap();
        f.add_buffer("out", vec![8], ElementType::I32, ArgumentKind::Output)
            .unwrap();
        assert_eq!(f.arguments(), &["in", "out"]);
    }

    #[test]
    fn test_max_range_dim_and_alignment() {
        let mut f = two_comp_function();
        assert_eq!(f.get_max_schedules_range_dim(), 2);
        f.align_schedules().unwrap();
        for c in f.computations() {
            assert_eq!(c.schedule().n_out(), 2);
        }
        // A's padded schedule maps i to (i, 0).
        let a = f.computation("A").unwrap();
        assert!(a.schedule().contains(&[3], &[3, 0], &[]));
        assert!(!a.schedule().contains(&[3], &[3, 1], &[]));
    }

    #[test]
    fn test_alignment_is_idempotent() {
        let mut f = two_comp_function();
        f.align_schedules().unwrap();
        let schedules: Vec<String> = f
            .computations()
            .iter()
            .map(|c| c.schedule().to_string())
            .collect();
        f.align_schedules().unwrap();
        let again: Vec<String> = f
            .computations()
            .iter()
            .map(|c| c.schedule().to_string())
            .collect();
        assert_eq!(schedules, again);
    }

    #[test]
    fn test_frozen_function_rejects_transformations() {
        let mut f = two_comp_function();
        f.align_schedules().unwrap();
        assert!(matches!(
            f.computation_mut("A"),
            Err(Error::PhaseViolation(_))
        ));
        assert!(matches!(
            f.after("B", "A", Computation::ROOT_DIMENSION),
            Err(Error::PhaseViolation(_))
        ));
        assert!(matches!(
            f.tag_parallel_dimension("A", 0),
            Err(Error::PhaseViolation(_))
        ));
    }

    #[test]
    fn test_after_orders_time_domains() {
        let mut f = Function::new("f").unwrap();
        f.add_computation("{ A[i] : 0 <= i < 8 }", Some(Expr::int(1)), true, ElementType::I32)
            .unwrap();
        f.add_computation("{ B[i] : 0 <= i < 8 }", Some(Expr::int(2)), true, ElementType::I32)
            .unwrap();
        f.after("B", "A", Computation::ROOT_DIMENSION).unwrap();
        f.gen_time_processor_domain().unwrap();

        let a = f.computation("A").unwrap().time_processor_domain().unwrap();
        let b = f.computation("B").unwrap().time_processor_domain().unwrap();
        for p in a.points(&[]).unwrap() {
            assert_eq!(p[0], 0);
        }
        for p in b.points(&[]).unwrap() {
            assert_eq!(p[0], 1);
        }
    }

    #[test]
    fn test_after_pads_shorter_schedule() {
        let mut f = two_comp_function();
        // A has a 1-dimensional range, B a 2-dimensional one.
        f.after("A", "B", Computation::ROOT_DIMENSION).unwrap();
        let a = f.computation("A").unwrap().schedule();
        let b = f.computation("B").unwrap().schedule();
        assert_eq!(a.n_out(), 3);
        assert_eq!(b.n_out(), 3);
        assert!(a.contains(&[3], &[1, 3, 0], &[]));
        assert!(b.contains(&[1, 2], &[0, 1, 2], &[]));
    }

    #[test]
    fn test_double_tag_rejected() {
        let mut f = two_comp_function();
        f.tag_parallel_dimension("A", 0).unwrap();
        f.tag_parallel_dimension("A", 0).unwrap();
        assert!(matches!(
            f.tag_parallel_dimension("A", 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(f.should_parallelize("A", 0));
        assert!(!f.should_parallelize("A", 1));
    }
}
