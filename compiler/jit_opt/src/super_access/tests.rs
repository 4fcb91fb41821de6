use pretty_assertions::assert_eq;

use super::*;
use crate::test_helpers::run_on;

const INPUT: &str = "fun f static {
  class A {
    slot tag: Str @16
    method describe
  }
  class B(A) {
    method describe
  }
  class C(B) {
  }
  bb 0 {
    v0:User[C] = LoadArg<0; \"self\">
    v1:Type[C] = LoadConst<Type[C]>
    v2:Object = LoadMethodSuper<0; \"describe\"> v1 v0
    v3:Object = CallMethod<0> v2 v0
    v4:Object = LoadAttrSuper<1; \"tag\"> v1 v0
    v5:Type[B] = LoadConst<Type[B]>
    v6:Object = LoadAttrSuper<0; \"describe\"> v5 v0
    v7:Object = LoadMethodSuper<2; \"missing\"> v1 v0
    v8:Tuple = MakeTuple<4> v3 v4 v6 v7
    Return v8
  }
}
";

#[test]
fn lookups_start_at_the_base_class() {
    assert_eq!(
        run_on(&mut SuperAccessResolution, INPUT),
        "fun f static {
  class A {
    slot tag: Str @16
    method describe
  }
  class B(A) {
    method describe
  }
  class C(B) {
  }
  bb 0 {
    v0:User[C] = LoadArg<0; \"self\">
    v1:Type[C] = LoadConst<Type[C]>
    v2:Func[\"B.describe\"] = LoadConst<Func[\"B.describe\"]>
    v3:Object = CallMethod<0> v2 v0
    v4:Str = LoadField<16; \"tag\", Str> v0
    v5:Type[B] = LoadConst<Type[B]>
    v6:Func[\"A.describe\"] = LoadConst<Func[\"A.describe\"]>
    v7:Object = LoadMethodSuper<2; \"missing\"> v1 v0
    v8:Tuple = MakeTuple<4> v3 v4 v6 v7
    Return v8
  }
}
"
    );
}

#[test]
fn resolved_method_feeds_call_optimization() {
    let mut func = crate::test_helpers::parse(INPUT);
    crate::run_pass(&mut SuperAccessResolution, &mut func).unwrap();
    crate::run_pass(&mut crate::CallOptimization, &mut func).unwrap();
    let text = jit_hir::print_function(&func);
    assert!(text.contains("    v3:Object = InvokeStatic<\"B.describe\", 1> v0\n"));
}
