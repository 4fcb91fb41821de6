use pretty_assertions::assert_eq;

use crate::ir::BlockId;
use crate::text::parse_function;

use super::*;

fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

fn parse(text: &str) -> Function {
    match parse_function(text) {
        Ok(func) => func,
        Err(e) => panic!("fixture does not parse: {e}"),
    }
}

/// bb 0 -> {bb 1, bb 2} -> bb 3
fn diamond() -> Function {
    parse(
        "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    v1:CBool = IsTruthy v0
    CondBranch<1, 2> v1
  }
  bb 1 (preds 0) {
    Branch<3>
  }
  bb 2 (preds 0) {
    Branch<3>
  }
  bb 3 (preds 1, 2) {
    Return v0
  }
}
",
    )
}

/// bb 0 -> bb 1 <-> bb 2, bb 1 -> bb 3
fn looping() -> Function {
    parse(
        "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    Branch<1>
  }
  bb 1 (preds 0, 2) {
    v1:CBool = IsTruthy v0
    CondBranch<2, 3> v1
  }
  bb 2 (preds 1) {
    Branch<1>
  }
  bb 3 (preds 1) {
    Return v0
  }
}
",
    )
}

#[test]
fn diamond_predecessors() {
    let preds = predecessors(&diamond());
    assert_eq!(preds[0], vec![]);
    assert_eq!(preds[1], vec![b(0)]);
    assert_eq!(preds[3], vec![b(1), b(2)]);
}

#[test]
fn same_target_counted_once() {
    let func = parse(
        "fun f {
  bb 0 {
    v0:CBool = LoadConst<CBool[true]>
    CondBranch<1, 1> v0
  }
  bb 1 (preds 0) {
    Unreachable
  }
}
",
    );
    assert_eq!(predecessors(&func)[1], vec![b(0)]);
    assert_eq!(successors(&func, b(0)), vec![b(1)]);
}

#[test]
fn reverse_postorder_visits_first_successor_first() {
    assert_eq!(reverse_postorder(&diamond()), vec![b(0), b(1), b(2), b(3)]);
    let rpo = reverse_postorder(&looping());
    assert_eq!(rpo[0], b(0));
    assert_eq!(rpo[1], b(1));
    assert_eq!(rpo.len(), 4);
}

#[test]
fn unreachable_blocks_are_skipped() {
    let func = parse(
        "fun f {
  bb 0 {
    v0:Object = LoadArg<0; \"x\">
    Return v0
  }
  bb 1 {
    Return v0
  }
}
",
    );
    assert_eq!(postorder(&func), vec![b(0)]);
    assert_eq!(reachable(&func), vec![true, false]);
}

#[test]
fn diamond_dominators() {
    let func = diamond();
    let dom = DominatorTree::build(&func);
    assert!(dom.dominates(b(0), b(3)));
    assert!(!dom.dominates(b(1), b(3)));
    assert!(!dom.dominates(b(2), b(3)));
    assert!(dom.dominates(b(3), b(3)));
    assert_eq!(dom.idom(b(3)), Some(b(0)));
    assert_eq!(dom.idom(b(0)), None);
}

#[test]
fn loop_dominators() {
    let dom = DominatorTree::build(&looping());
    assert!(dom.dominates(b(1), b(2)));
    assert!(dom.dominates(b(1), b(3)));
    assert!(!dom.dominates(b(2), b(1)));
    assert_eq!(dom.idom(b(2)), Some(b(1)));
}
