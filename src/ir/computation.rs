//! Computations: expressions over named iteration domains.
//!
//! A computation owns its iteration domain, its schedule (initialized to
//! the identity relation with the range tuple name erased), an optional
//! access relation, and the body expression lowered into its store leaf.
//!
//! Schedule transformations rewrite the schedule's range through the
//! textual form: the schedule is serialized, its range dimension list is
//! rewritten, constraints are appended, and the result is parsed back.
//! This works because the identity schedule names its range dimensions
//! after the domain dimensions, so renaming a range dimension frees the
//! name to denote the domain dimension inside the added constraints.
//! Every transformation builds its candidate schedule first and installs
//! it only on success, leaving the computation untouched on error.

use crate::codegen::{ElementType, Expr};
use crate::ir::buffer::Buffer;
use crate::parser::MapTokens;
use crate::polyhedral::map::Map;
use crate::polyhedral::set::Set;
use crate::polyhedral::space::fresh_name;
use crate::utils::errors::{AlgebraError, Error, Result};

/// A computation over an integer iteration domain.
#[derive(Debug, Clone)]
pub struct Computation {
    name: String,
    iteration_domain: Set,
    schedule: Map,
    access: Option<Map>,
    time_processor_domain: Option<Set>,
    body: Option<Expr>,
    element_type: ElementType,
    schedulable: bool,
    auto_data_mapping: bool,
}

impl Computation {
    /// Depth value for [`crate::ir::Function::after`] denoting the root of
    /// the time-processor space: the successor runs after every instance
    /// of the predecessor.
    pub const ROOT_DIMENSION: i32 = -1;

    pub(crate) fn new(
        iteration_space: &str,
        body: Option<Expr>,
        schedulable: bool,
        element_type: ElementType,
        extra_params: &[String],
        auto_data_mapping: bool,
    ) -> Result<Self> {
        if iteration_space.trim().is_empty() {
            return Err(Error::InvalidInput("empty iteration space".to_string()));
        }
        let iteration_domain = Set::parse_with_params(iteration_space, extra_params)?;
        let name = iteration_domain.tuple_name().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput(format!(
                "iteration space `{}` has no tuple name",
                iteration_space
            )));
        }
        if schedulable && body.is_none() {
            return Err(Error::InvalidInput(format!(
                "computation `{}` is schedulable but has no body expression",
                name
            )));
        }
        let schedule = Map::identity_on(&iteration_domain);
        Ok(Self {
            name,
            iteration_domain,
            schedule,
            access: None,
            time_processor_domain: None,
            body,
            element_type,
            schedulable,
            auto_data_mapping,
        })
    }

    /// Computation name (the tuple name of its iteration space).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iteration domain.
    pub fn iteration_domain(&self) -> &Set {
        &self.iteration_domain
    }

    /// Current schedule.
    pub fn schedule(&self) -> &Map {
        &self.schedule
    }

    /// Access relation, if bound.
    pub fn access(&self) -> Option<&Map> {
        self.access.as_ref()
    }

    /// Time-processor domain; `None` until
    /// [`crate::ir::Function::gen_time_processor_domain`] runs.
    pub fn time_processor_domain(&self) -> Option<&Set> {
        self.time_processor_domain.as_ref()
    }

    /// Body expression; `None` for wrapper computations.
    pub fn body(&self) -> Option<&Expr> {
        self.body.as_ref()
    }

    /// Element type of the computed value.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// False for wrappers that exist only to name a read.
    pub fn is_schedulable(&self) -> bool {
        self.schedulable
    }

    /// Install a schedule, refreshing the access relation when auto data
    /// mapping is on.
    pub fn set_schedule(&mut self, schedule: Map) -> Result<()> {
        if schedule.n_in() != self.iteration_domain.dim() {
            return Err(Error::DimensionalityMismatch(format!(
                "schedule domain has {} dimensions, iteration domain has {}",
                schedule.n_in(),
                self.iteration_domain.dim()
            )));
        }
        if schedule.in_tuple() != self.name {
            return Err(Error::DimensionalityMismatch(format!(
                "schedule domain tuple `{}` does not match computation `{}`",
                schedule.in_tuple(),
                self.name
            )));
        }
        self.schedule = schedule;
        self.refresh_access();
        Ok(())
    }

    /// Split range dimension `in_dim` into an outer and an inner
    /// dimension, with `size` the extent of the inner one.
    pub fn split(&mut self, in_dim: usize, size: i64) -> Result<()> {
        if size < 1 {
            return Err(Error::InvalidInput(format!(
                "split size must be >= 1, got {}",
                size
            )));
        }
        self.check_range_dim(in_dim)?;

        let mut tokens = self.schedule_tokens()?;
        let dim_name = tokens.range_dims[in_dim].clone();
        let taken: Vec<String> = tokens.all_names().iter().map(|s| s.to_string()).collect();
        let taken_refs: Vec<&str> = taken.iter().map(|s| s.as_str()).collect();
        let outer = fresh_name(&format!("{}_out", dim_name), &taken_refs);
        let mut taken_refs = taken_refs;
        taken_refs.push(&outer);
        let inner = fresh_name(&format!("{}_in", dim_name), &taken_refs);

        tokens.replace(&dim_name, &outer, &inner);
        tokens.add_constraint(format!("{} = {}*{} + {}", dim_name, size, outer, inner));
        tokens.add_constraint(format!("0 <= {} < {}", inner, size));

        let schedule = Map::parse_with_params(&tokens.to_string(), &self.iteration_domain.params)?;
        self.set_schedule(schedule)
    }

    /// Swap range dimensions `in_dim0` and `in_dim1`; constraints follow
    /// the renamed dimensions.
    pub fn interchange(&mut self, in_dim0: usize, in_dim1: usize) -> Result<()> {
        self.check_range_dim(in_dim0)?;
        self.check_range_dim(in_dim1)?;
        if in_dim0 == in_dim1 {
            return Ok(());
        }
        let mut tokens = self.schedule_tokens()?;
        tokens.range_dims.swap(in_dim0, in_dim1);
        let schedule = Map::parse_with_params(&tokens.to_string(), &self.iteration_domain.params)?;
        self.set_schedule(schedule)
    }

    /// Rectangular tiling of two consecutive dimensions: equivalent to
    /// `split(in_dim1, size_y); split(in_dim0, size_x);
    /// interchange(in_dim0 + 1, in_dim1 + 1)`.
    ///
    /// Requires `in_dim0 < in_dim1` with the two dimensions consecutive.
    pub fn tile(&mut self, in_dim0: usize, in_dim1: usize, size_x: i64, size_y: i64) -> Result<()> {
        if in_dim1 != in_dim0 + 1 {
            return Err(Error::InvalidInput(format!(
                "tile requires consecutive dimensions with in_dim0 < in_dim1, got {} and {}",
                in_dim0, in_dim1
            )));
        }
        self.check_range_dim(in_dim1)?;

        let saved_schedule = self.schedule.clone();
        let saved_access = self.access.clone();
        let result = (|| {
            self.split(in_dim1, size_y)?;
            self.split(in_dim0, size_x)?;
            self.interchange(in_dim0 + 1, in_dim1 + 1)
        })();
        if result.is_err() {
            self.schedule = saved_schedule;
            self.access = saved_access;
        }
        result
    }

    /// Set the access relation from ISL map text.
    pub fn set_access(&mut self, access_str: &str, extra_params: &[String]) -> Result<()> {
        if access_str.trim().is_empty() {
            return Err(Error::InvalidInput("empty access text".to_string()));
        }
        let access = Map::parse_with_params(access_str, extra_params)?;
        if access.n_in() != self.iteration_domain.dim() {
            return Err(Error::DimensionalityMismatch(format!(
                "access domain has {} dimensions, iteration domain has {}",
                access.n_in(),
                self.iteration_domain.dim()
            )));
        }
        if access.in_tuple() != self.name {
            return Err(Error::DimensionalityMismatch(format!(
                "access domain tuple `{}` does not match computation `{}`",
                access.in_tuple(),
                self.name
            )));
        }
        self.access = Some(access);
        Ok(())
    }

    /// Bind to a buffer: a one-to-one mapping from the iteration domain to
    /// the buffer's index space.
    pub fn bind_to(&mut self, buffer: &Buffer) -> Result<()> {
        if buffer.n_dims() != self.iteration_domain.dim() {
            return Err(Error::DimensionalityMismatch(format!(
                "cannot bind `{}` ({} dimensions) one-to-one to buffer `{}` ({} dimensions)",
                self.name,
                self.iteration_domain.dim(),
                buffer.name(),
                buffer.n_dims()
            )));
        }
        let mut access = Map::identity_on(&self.iteration_domain);
        access.set_out_tuple(buffer.name());
        access.coalesce();
        self.access = Some(access);
        Ok(())
    }

    /// Compute the time-processor domain by applying the schedule to the
    /// iteration domain.
    pub(crate) fn gen_time_processor_domain(&mut self) -> Result<()> {
        let tp = self.schedule.apply(&self.iteration_domain)?;
        self.time_processor_domain = Some(tp);
        Ok(())
    }

    /// Pad the schedule range with zero-valued dimensions up to `n`
    /// dimensions.
    pub(crate) fn pad_schedule_to(&mut self, n: usize) {
        while self.schedule.n_out() < n {
            let pos = self.schedule.n_out();
            let name = self.fresh_range_dim("z");
            self.schedule.insert_out_dim(pos, name);
            self.schedule.fix_out_dim(pos, 0);
        }
        self.schedule.coalesce();
        self.refresh_access();
    }

    /// Insert an ordering dimension with a constant value at `pos`.
    pub(crate) fn insert_order_dim(&mut self, pos: usize, value: i64) {
        let name = self.fresh_range_dim("o");
        self.schedule.insert_out_dim(pos, name);
        self.schedule.fix_out_dim(pos, value);
        self.schedule.coalesce();
        self.refresh_access();
    }

    /// Storage follows scheduling: the access relation derived from the
    /// current schedule, targeting `target`.
    pub(crate) fn access_from_schedule(&self, target: &str) -> Map {
        let mut access = self.schedule.clone();
        access.set_out_tuple(target);
        access
    }

    /// When auto data mapping is on and an access relation exists,
    /// re-derive it from the current schedule, keeping the bound target.
    fn refresh_access(&mut self) {
        if !self.auto_data_mapping {
            return;
        }
        if let Some(access) = &self.access {
            let target = access.out_tuple().to_string();
            self.access = Some(self.access_from_schedule(&target));
        }
    }

    fn check_range_dim(&self, dim: usize) -> Result<()> {
        if dim >= self.schedule.n_out() {
            return Err(Error::DimensionalityMismatch(format!(
                "schedule of `{}` has {} range dimensions, dimension {} does not exist",
                self.name,
                self.schedule.n_out(),
                dim
            )));
        }
        Ok(())
    }

    fn schedule_tokens(&self) -> Result<MapTokens> {
        MapTokens::parse(&self.schedule.to_string()).map_err(|e| {
            Error::Algebra(AlgebraError::MalformedText {
                message: e.message,
                offset: e.offset,
            })
        })
    }

    fn fresh_range_dim(&self, base: &str) -> String {
        let taken: Vec<&str> = self
            .schedule
            .in_space
            .dims
            .iter()
            .chain(self.schedule.out_space.dims.iter())
            .chain(self.schedule.params.iter())
            .map(|s| s.as_str())
            .collect();
        let mut candidate = format!("{}0", base);
        let mut i = 0;
        while taken.contains(&candidate.as_str()) {
            i += 1;
            candidate = format!("{}{}", base, i);
        }
        candidate
    }

    /// Dump the iteration domain on standard output.
    pub fn dump_iteration_domain(&self) {
        println!("{}", self.iteration_domain);
    }

    /// Dump the schedule on standard output.
    pub fn dump_schedule(&self) {
        println!("{}", self.schedule);
    }

    /// Dump most fields on standard output.
    pub fn dump(&self) {
        println!("computation {}", self.name);
        println!("  iteration domain: {}", self.iteration_domain);
        println!("  schedule: {}", self.schedule);
        match &self.access {
            Some(access) => println!("  access: {}", access),
            None => println!("  access: (null)"),
        }
        match &self.time_processor_domain {
            Some(tp) => println!("  time-processor domain: {}", tp),
            None => println!("  time-processor domain: (null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(space: &str) -> Computation {
        Computation::new(
            space,
            Some(Expr::int(0)),
            true,
            ElementType::U8,
            &[],
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_identity_schedule_is_neutral() {
        let c = comp("{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }");
        assert_eq!(c.name(), "S");
        let image = c.schedule().apply(c.iteration_domain()).unwrap();
        assert_eq!(image.tuple_name(), "");
        assert_eq!(
            image.points(&[]).unwrap(),
            c.iteration_domain().points(&[]).unwrap()
        );
    }

    #[test]
    fn test_split_relation() {
        let mut c = comp("{ S[i] : 0 <= i < 16 }");
        c.split(0, 4).unwrap();
        let s = c.schedule();
        assert_eq!(s.n_out(), 2);
        // i = 4*i_out + i_in with 0 <= i_in < 4
        assert!(s.contains(&[0], &[0, 0], &[]));
        assert!(s.contains(&[7], &[1, 3], &[]));
        assert!(s.contains(&[15], &[3, 3], &[]));
        assert!(!s.contains(&[7], &[1, 2], &[]));
        assert!(!s.contains(&[7], &[0, 7], &[]));
    }

    #[test]
    fn test_split_preserves_domain() {
        let mut c = comp("{ S[i] : 0 <= i < 16 }");
        c.split(0, 4).unwrap();
        let image = c.schedule().apply(c.iteration_domain()).unwrap();
        let points = image.points(&[]).unwrap();
        assert_eq!(points.len(), 16);
        // Recombining outer*4 + inner restores the original dimension.
        let mut recombined: Vec<i64> = points.iter().map(|p| p[0] * 4 + p[1]).collect();
        recombined.sort_unstable();
        assert_eq!(recombined, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rejects_bad_input() {
        let mut c = comp("{ S[i] : 0 <= i < 16 }");
        assert!(matches!(c.split(0, 0), Err(Error::InvalidInput(_))));
        assert!(matches!(
            c.split(1, 4),
            Err(Error::DimensionalityMismatch(_))
        ));
        // Failed calls leave the schedule untouched.
        assert_eq!(c.schedule().n_out(), 1);
    }

    #[test]
    fn test_interchange_swaps_and_is_involutive() {
        let mut c = comp("{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }");
        let before = c.schedule().clone();
        c.interchange(0, 1).unwrap();
        assert!(c.schedule().contains(&[1, 2], &[2, 1], &[]));
        assert!(!c.schedule().contains(&[1, 2], &[1, 2], &[]));
        c.interchange(0, 1).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(
                    c.schedule().contains(&[i, j], &[i, j], &[]),
                    before.contains(&[i, j], &[i, j], &[])
                );
                assert_eq!(
                    c.schedule().contains(&[i, j], &[j, i], &[]),
                    before.contains(&[i, j], &[j, i], &[])
                );
            }
        }
    }

    #[test]
    fn test_tile_equals_expansion() {
        let mut tiled = comp("{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }");
        tiled.tile(0, 1, 2, 2).unwrap();

        let mut expanded = comp("{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }");
        expanded.split(1, 2).unwrap();
        expanded.split(0, 2).unwrap();
        expanded.interchange(1, 2).unwrap();

        assert_eq!(tiled.schedule().n_out(), 4);
        for i in 0..10 {
            for j in 0..20 {
                let out = [i / 2, j / 2, i % 2, j % 2];
                assert!(tiled.schedule().contains(&[i, j], &out, &[]));
                assert!(expanded.schedule().contains(&[i, j], &out, &[]));
                let wrong = [i / 2, j / 2, i % 2, (j % 2 + 1) % 2];
                assert_eq!(
                    tiled.schedule().contains(&[i, j], &wrong, &[]),
                    expanded.schedule().contains(&[i, j], &wrong, &[])
                );
            }
        }
    }

    #[test]
    fn test_tile_rejects_non_consecutive() {
        let mut c = comp("{ S[i, j, k] : 0 <= i < 4 and 0 <= j < 4 and 0 <= k < 4 }");
        assert!(matches!(c.tile(0, 2, 2, 2), Err(Error::InvalidInput(_))));
        assert!(matches!(c.tile(1, 0, 2, 2), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_auto_data_mapping_follows_schedule() {
        let mut c = Computation::new(
            "{ S[i] : 0 <= i < 16 }",
            Some(Expr::int(0)),
            true,
            ElementType::U8,
            &[],
            true,
        )
        .unwrap();
        let buffer = Buffer::new("b", vec![16], ElementType::U8, super::super::ArgumentKind::Output)
            .unwrap();
        c.bind_to(&buffer).unwrap();
        c.split(0, 4).unwrap();

        // The access equals the schedule with the range renamed to the
        // bound buffer.
        let access = c.access().unwrap();
        assert_eq!(access.out_tuple(), "b");
        assert_eq!(access.n_out(), 2);
        assert!(access.contains(&[7], &[1, 3], &[]));
    }

    #[test]
    fn test_wrapper_requires_no_body() {
        let c = Computation::new(
            "{ input[i] : 0 <= i < 8 }",
            None,
            false,
            ElementType::U8,
            &[],
            false,
        )
        .unwrap();
        assert!(!c.is_schedulable());
        assert!(c.body().is_none());

        assert!(Computation::new(
            "{ S[i] : 0 <= i < 8 }",
            None,
            true,
            ElementType::U8,
            &[],
            false,
        )
        .is_err());
    }
}
