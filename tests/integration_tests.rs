//! Integration tests for the declaration -> transformation -> lowering
//! pipeline.

use polyfront::prelude::*;

/// A 10x20 pointwise function: `output[i,j] = input[i,j] + (u8)i + 4`.
fn pointwise(auto_data_mapping: bool) -> Function {
    let mut f = Function::with_options(
        "pointwise",
        Options { auto_data_mapping },
    )
    .unwrap();
    f.add_buffer("in_buf", vec![10, 20], ElementType::U8, ArgumentKind::Input)
        .unwrap();
    f.add_buffer("out_buf", vec![10, 20], ElementType::U8, ArgumentKind::Output)
        .unwrap();
    f.add_computation(
        "{ input[i, j] : 0 <= i < 10 and 0 <= j < 20 }",
        None,
        false,
        ElementType::U8,
    )
    .unwrap();
    f.add_computation(
        "{ output[i, j] : 0 <= i < 10 and 0 <= j < 20 }",
        Some(
            Expr::access("input", vec![Expr::var("i"), Expr::var("j")])
                .add(Expr::cast(ElementType::U8, Expr::var("i")))
                .add(Expr::int(4)),
        ),
        true,
        ElementType::U8,
    )
    .unwrap();
    f
}

#[test]
fn test_pointwise_add() {
    let mut f = pointwise(false);
    f.bind_to("input", "in_buf").unwrap();
    f.bind_to("output", "out_buf").unwrap();

    let code = f.gen_c_code().unwrap();
    assert_eq!(code.matches("for (").count(), 2);
    assert!(code.contains("for (int64_t c0 = 0; c0 < 10; c0++) {"));
    assert!(code.contains("for (int64_t c1 = 0; c1 < 20; c1++) {"));
    assert!(!code.contains("#pragma"));
    assert_eq!(code.matches("out_buf[").count(), 1);
    assert!(code.contains(
        "out_buf[((c0 * 20) + c1)] = ((in_buf[((c0 * 20) + c1)] + (uint8_t)(c0)) + 4);"
    ));
}

#[test]
fn test_tile_and_parallelize() {
    let mut f = pointwise(false);
    f.computation_mut("output").unwrap().tile(0, 1, 2, 2).unwrap();
    f.tag_parallel_dimension("output", 0).unwrap();
    f.bind_to("input", "in_buf").unwrap();
    f.bind_to("output", "out_buf").unwrap();

    let code = f.gen_c_code().unwrap();
    // Two tile loops and two point loops, all with constant bounds.
    assert_eq!(code.matches("for (").count(), 4);
    assert!(code.contains("for (int64_t c0 = 0; c0 < 5; c0++) {"));
    assert!(code.contains("for (int64_t c1 = 0; c1 < 10; c1++) {"));
    assert!(code.contains("for (int64_t c2 = 0; c2 < 2; c2++) {"));
    assert!(code.contains("for (int64_t c3 = 0; c3 < 2; c3++) {"));
    // Only the outermost loop is parallel.
    assert_eq!(code.matches("#pragma omp parallel for").count(), 1);
    let pragma = code.find("#pragma omp parallel for").unwrap();
    let outer = code.find("for (int64_t c0").unwrap();
    assert!(pragma < outer);
    // The store leaf recombines the tiled iterators.
    assert!(code.contains(
        "out_buf[((((2 * c0) + c2) * 20) + ((2 * c1) + c3))]"
    ));
}

#[test]
fn test_split() {
    let mut f = Function::new("split16").unwrap();
    f.add_buffer("out_buf", vec![16], ElementType::I32, ArgumentKind::Output)
        .unwrap();
    f.add_computation(
        "{ S[i] : 0 <= i < 16 }",
        Some(Expr::var("i")),
        true,
        ElementType::I32,
    )
    .unwrap();
    f.computation_mut("S").unwrap().split(0, 4).unwrap();
    f.bind_to("S", "out_buf").unwrap();

    let code = f.gen_c_code().unwrap();
    assert_eq!(code.matches("for (").count(), 2);
    assert!(code.contains("for (int64_t c0 = 0; c0 < 4; c0++) {"));
    assert!(code.contains("for (int64_t c1 = 0; c1 < 4; c1++) {"));
    // i = 4*c0 + c1 both as index and as value.
    assert!(code.contains("out_buf[((4 * c0) + c1)] = ((4 * c0) + c1);"));
}

#[test]
fn test_interchange() {
    let mut f = Function::new("swap").unwrap();
    f.add_buffer("out_buf", vec![4, 4], ElementType::I32, ArgumentKind::Output)
        .unwrap();
    f.add_computation(
        "{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }",
        Some(Expr::var("i")),
        true,
        ElementType::I32,
    )
    .unwrap();
    f.computation_mut("S").unwrap().interchange(0, 1).unwrap();
    f.bind_to("S", "out_buf").unwrap();

    let code = f.gen_c_code().unwrap();
    // After the interchange the outer loop iterates j: the original i is
    // the inner iterator c1.
    assert!(code.contains("out_buf[((c1 * 4) + c0)] = c1;"));
}

#[test]
fn test_after_root_dimension() {
    let mut f = Function::new("seq").unwrap();
    f.add_buffer("a_buf", vec![8], ElementType::I32, ArgumentKind::Output)
        .unwrap();
    f.add_buffer("b_buf", vec![8], ElementType::I32, ArgumentKind::Output)
        .unwrap();
    f.add_computation(
        "{ A[i] : 0 <= i < 8 }",
        Some(Expr::int(1)),
        true,
        ElementType::I32,
    )
    .unwrap();
    f.add_computation(
        "{ B[i] : 0 <= i < 8 }",
        Some(Expr::int(2)),
        true,
        ElementType::I32,
    )
    .unwrap();
    f.after("B", "A", Computation::ROOT_DIMENSION).unwrap();
    f.bind_to("A", "a_buf").unwrap();
    f.bind_to("B", "b_buf").unwrap();

    let code = f.gen_c_code().unwrap();
    // All 8 iterations of A run before any of B: two separate loops with
    // A's store first.
    assert_eq!(code.matches("for (").count(), 2);
    assert!(code.find("a_buf[").unwrap() < code.find("b_buf[").unwrap());
}

#[test]
fn test_auto_mapping_off_requires_binding() {
    let mut f = pointwise(false);
    f.bind_to("input", "in_buf").unwrap();
    // `output` is never bound.
    match f.gen_c_code() {
        Err(Error::UnboundComputation(name)) => assert_eq!(name, "output"),
        other => panic!("expected UnboundComputation, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invariant_bound_and_let() {
    let mut f = Function::new("param_loop").unwrap();
    f.add_invariant("N", Expr::int(32)).unwrap();
    f.add_buffer("out_buf", vec![32], ElementType::I32, ArgumentKind::Output)
        .unwrap();
    f.add_computation(
        "{ S[i] : 0 <= i < N }",
        Some(Expr::var("i")),
        true,
        ElementType::I32,
    )
    .unwrap();
    f.bind_to("S", "out_buf").unwrap();

    let code = f.gen_c_code().unwrap();
    assert!(code.contains("int64_t N = 32;"));
    assert!(code.contains("for (int64_t c0 = 0; c0 < N; c0++) {"));
}

#[test]
fn test_vector_tag() {
    let mut f = Function::new("vec").unwrap();
    f.add_buffer("out_buf", vec![8], ElementType::F32, ArgumentKind::Output)
        .unwrap();
    f.add_computation(
        "{ S[i] : 0 <= i < 8 }",
        Some(Expr::int(0)),
        true,
        ElementType::F32,
    )
    .unwrap();
    f.tag_vector_dimension("S", 0).unwrap();
    f.bind_to("S", "out_buf").unwrap();

    let code = f.gen_c_code().unwrap();
    assert!(code.contains("#pragma omp simd"));
}

#[test]
fn test_transform_chain_and_alignment() {
    // A transformed computation next to an untransformed one: alignment
    // pads the shorter schedule and both still lower.
    let mut f = Function::new("mixed").unwrap();
    f.add_buffer("a_buf", vec![16], ElementType::I32, ArgumentKind::Output)
        .unwrap();
    f.add_buffer("b_buf", vec![16], ElementType::I32, ArgumentKind::Output)
        .unwrap();
    f.add_computation(
        "{ A[i] : 0 <= i < 16 }",
        Some(Expr::int(1)),
        true,
        ElementType::I32,
    )
    .unwrap();
    f.add_computation(
        "{ B[i] : 0 <= i < 16 }",
        Some(Expr::int(2)),
        true,
        ElementType::I32,
    )
    .unwrap();
    f.computation_mut("A").unwrap().split(0, 4).unwrap();
    f.bind_to("A", "a_buf").unwrap();
    f.bind_to("B", "b_buf").unwrap();

    assert_eq!(f.get_max_schedules_range_dim(), 2);
    let code = f.gen_c_code().unwrap();
    assert!(code.contains("a_buf[((4 * c0) + c1)]"));
    assert!(code.contains("b_buf[c0]"));

    // Lowering froze the function.
    assert!(matches!(
        f.computation_mut("B"),
        Err(Error::PhaseViolation(_))
    ));
}

#[test]
fn test_schedule_dump_round_trips() {
    let mut f = Function::new("texty").unwrap();
    f.add_computation(
        "{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }",
        Some(Expr::int(0)),
        true,
        ElementType::I32,
    )
    .unwrap();
    f.computation_mut("S").unwrap().tile(0, 1, 2, 2).unwrap();

    let text = f.computation("S").unwrap().schedule().to_string();
    let reparsed = Map::parse(&text).unwrap();
    for (i, j) in [(0i64, 0i64), (3, 7), (9, 19)] {
        let out = [i / 2, j / 2, i % 2, j % 2];
        assert!(reparsed.contains(&[i, j], &out, &[]));
    }
}
