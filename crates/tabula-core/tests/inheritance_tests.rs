//! Inheritance merge, constructor chaining and subtype semantics.

use tabula_core::{arg, receiver, ClassBody, Instance, Registry, Value};

fn spawn(reg: &Registry, name: &str, args: &[Value]) -> Instance {
    reg.instantiate(name, args)
        .unwrap()
        .as_instance()
        .cloned()
        .unwrap()
}

#[test]
fn first_parent_wins_on_conflicting_defaults() {
    let reg = Registry::new();
    reg.define("A", &[], ClassBody::new().set("x", 1.0)).unwrap();
    reg.define("B", &[], ClassBody::new().set("x", 2.0)).unwrap();
    reg.define("C", &["A", "B"], ClassBody::new()).unwrap();

    let c = spawn(&reg, "C", &[]);
    assert_eq!(c.get("x").unwrap(), Value::Number(1.0));
}

#[test]
fn soft_nil_loses_to_concrete_value() {
    let reg = Registry::new();
    reg.define("A", &[], ClassBody::new().set("x", Value::HardNil))
        .unwrap();
    reg.define("B", &["A"], ClassBody::new().set("x", "v")).unwrap();
    reg.define("C", &[], ClassBody::new().set("x", Value::SoftNil))
        .unwrap();
    reg.define("D", &["B", "C"], ClassBody::new()).unwrap();

    let d = spawn(&reg, "D", &[]);
    assert_eq!(d.get("x").unwrap(), Value::str("v"));
}

#[test]
fn hard_nil_wins_the_parent_merge() {
    let reg = Registry::new();
    reg.define("A", &[], ClassBody::new().set("x", Value::HardNil))
        .unwrap();
    reg.define("B", &["A"], ClassBody::new().set("x", "v")).unwrap();
    reg.define("C", &[], ClassBody::new().set("x", Value::HardNil))
        .unwrap();
    reg.define("D", &["B", "C"], ClassBody::new()).unwrap();

    let d = spawn(&reg, "D", &[]);
    assert_eq!(d.get("x").unwrap(), Value::Nil);
}

#[test]
fn own_body_redeclaration_replaces_inherited_hard_nil() {
    let reg = Registry::new();
    reg.define("A", &[], ClassBody::new().set("x", Value::HardNil))
        .unwrap();
    reg.define("B", &["A"], ClassBody::new().set("x", "v")).unwrap();

    let b = spawn(&reg, "B", &[]);
    assert_eq!(b.get("x").unwrap(), Value::str("v"));
}

#[test]
fn own_body_soft_nil_loses_to_inherited_concrete() {
    let reg = Registry::new();
    reg.define("A", &[], ClassBody::new().set("x", "kept")).unwrap();
    reg.define("B", &["A"], ClassBody::new().set("x", Value::SoftNil))
        .unwrap();

    let b = spawn(&reg, "B", &[]);
    assert_eq!(b.get("x").unwrap(), Value::str("kept"));
}

#[test]
fn constructor_runs_with_forwarded_arguments() {
    let reg = Registry::new();
    reg.define(
        "Bullet",
        &[],
        ClassBody::new()
            .set("velocity", 0.0)
            .set("angle", 0.0)
            .method("Bullet", |args| {
                let this = receiver(args)?;
                this.set("velocity", arg(args, 1))?;
                this.set("angle", arg(args, 2))?;
                Ok(Value::Nil)
            }),
    )
    .unwrap();

    let b = spawn(&reg, "Bullet", &[Value::Number(20.0), Value::Number(0.0)]);
    assert_eq!(b.get("velocity").unwrap(), Value::Number(20.0));
    assert_eq!(b.get("angle").unwrap(), Value::Number(0.0));
}

#[test]
fn missing_constructor_means_none_runs() {
    let reg = Registry::new();
    reg.define("Plain", &[], ClassBody::new().set("x", 1.0)).unwrap();
    // Arguments are simply ignored when no constructor exists.
    let p = spawn(&reg, "Plain", &[Value::Number(99.0)]);
    assert_eq!(p.get("x").unwrap(), Value::Number(1.0));
}

#[test]
fn inherit_constructor_forwards_to_parent() {
    let reg = Registry::new();
    reg.define(
        "Bullet",
        &[],
        ClassBody::new()
            .set("velocity", 0.0)
            .set("angle", 0.0)
            .method("Bullet", |args| {
                let this = receiver(args)?;
                this.set("velocity", arg(args, 1))?;
                this.set("angle", arg(args, 2))?;
                Ok(Value::Nil)
            }),
    )
    .unwrap();
    reg.define(
        "BigBullet",
        &["Bullet"],
        ClassBody::new()
            .set("size", 2.0)
            .inherit_constructor("BigBullet"),
    )
    .unwrap();

    let big = spawn(&reg, "BigBullet", &[Value::Number(20.0), Value::Number(0.0)]);
    assert_eq!(big.get("velocity").unwrap(), Value::Number(20.0));
    assert_eq!(big.get("angle").unwrap(), Value::Number(0.0));
    assert_eq!(big.get("size").unwrap(), Value::Number(2.0));
}

#[test]
fn explicit_super_constructor_call() {
    let reg = Registry::new();
    reg.define(
        "Shape",
        &[],
        ClassBody::new().set("sides", 0.0).method("Shape", |args| {
            let this = receiver(args)?;
            this.set("sides", arg(args, 1))?;
            Ok(Value::Nil)
        }),
    )
    .unwrap();
    reg.define(
        "Square",
        &["Shape"],
        ClassBody::new().set("area", 0.0).method("Square", |args| {
            let this = receiver(args)?;
            // The super record is a protected constant field named after
            // the parent; calling it runs the parent's constructor.
            let sup = this.get("Shape")?;
            sup.call(&[args[0].clone(), Value::Number(4.0)])?;
            let side = arg(args, 1).as_number().unwrap_or(0.0);
            this.set("area", side * side)?;
            Ok(Value::Nil)
        }),
    )
    .unwrap();

    let sq = spawn(&reg, "Square", &[Value::Number(3.0)]);
    assert_eq!(sq.get("sides").unwrap(), Value::Number(4.0));
    assert_eq!(sq.get("area").unwrap(), Value::Number(9.0));
}

#[test]
fn super_without_constructor_errors() {
    let reg = Registry::new();
    reg.define("Base", &[], ClassBody::new().set("x", 1.0)).unwrap();
    reg.define(
        "Derived",
        &["Base"],
        ClassBody::new().inherit_constructor("Derived"),
    )
    .unwrap();

    let err = reg.instantiate("Derived", &[]).unwrap_err();
    assert_eq!(err.to_string(), "class `Base` has no constructor");
}

#[test]
fn diamond_inheritance_is_permitted() {
    let reg = Registry::new();
    reg.define("Root", &[], ClassBody::new().set("tag", "root"))
        .unwrap();
    reg.define("Left", &["Root"], ClassBody::new()).unwrap();
    reg.define("Right", &["Root"], ClassBody::new()).unwrap();
    reg.define("Bottom", &["Left", "Right"], ClassBody::new()).unwrap();

    let b = spawn(&reg, "Bottom", &[]);
    assert_eq!(b.get("tag").unwrap(), Value::str("root"));
    assert!(reg.is_subtype("Bottom", "Root"));
}

#[test]
fn subtype_checks_accept_names_and_instances() {
    let reg = Registry::new();
    reg.define("Animal", &[], ClassBody::new()).unwrap();
    reg.define("Cat", &["Animal"], ClassBody::new()).unwrap();

    let cat = spawn(&reg, "Cat", &[]);
    assert!(reg.is_subtype("Cat", "Animal"));
    assert!(reg.is_subtype(&cat, "Animal"));
    assert!(reg.is_subtype("Cat", "Cat"));
    assert!(!reg.is_subtype("Animal", "Cat"));
    assert!(!reg.is_subtype("Unregistered", "Animal"));
    assert!(cat.is_a("Animal"));
    assert!(!cat.is_a("Dog"));
}

#[test]
fn class_name_is_reported() {
    let reg = Registry::new();
    reg.define("Animal", &[], ClassBody::new()).unwrap();
    let a = spawn(&reg, "Animal", &[]);
    assert_eq!(a.class_name(), "Animal");
    assert_eq!(reg.class_name(&a), "Animal");
}

#[test]
fn grandchild_keeps_ancestor_visibility() {
    let reg = Registry::new();
    reg.define(
        "A",
        &[],
        ClassBody::new()
            .set("protected__hp", 10.0)
            .method("hp_of", |args| receiver(args)?.get("hp")),
    )
    .unwrap();
    reg.define("B", &["A"], ClassBody::new()).unwrap();
    reg.define("C", &["B"], ClassBody::new()).unwrap();

    let c = spawn(&reg, "C", &[]);
    // Still protected two generations down: blocked from outside,
    // reachable from any method scope.
    assert!(c.get("hp").is_err());
    assert_eq!(c.call("hp_of", &[]).unwrap(), Value::Number(10.0));
}

#[test]
fn method_override_keeps_visibility_and_dispatches_to_child() {
    let reg = Registry::new();
    reg.define(
        "Animal",
        &[],
        ClassBody::new().method("speak", |_| Ok(Value::str("..."))),
    )
    .unwrap();
    reg.define(
        "Cat",
        &["Animal"],
        ClassBody::new().method("speak", |_| Ok(Value::str("meow"))),
    )
    .unwrap();

    let cat = spawn(&reg, "Cat", &[]);
    assert_eq!(cat.call("speak", &[]).unwrap(), Value::str("meow"));
}

#[test]
fn parent_methods_stay_reachable_through_super_record() {
    let reg = Registry::new();
    reg.define(
        "Animal",
        &[],
        ClassBody::new()
            .method("speak", |_| Ok(Value::str("...")))
            .method("Animal", |_| Ok(Value::Nil)),
    )
    .unwrap();
    reg.define(
        "Cat",
        &["Animal"],
        ClassBody::new()
            .method("speak", |args| {
                let this = receiver(args)?;
                let sup = this.get("Animal")?;
                let base = match &sup {
                    Value::Super(s) => s.method("speak").unwrap(),
                    _ => panic!("super record expected"),
                };
                let quiet = base.invoke(&[args[0].clone()])?;
                let quiet = quiet.as_str().unwrap_or("").to_string();
                Ok(Value::from(format!("{quiet}meow")))
            })
            .inherit_constructor("Cat"),
    )
    .unwrap();

    let cat = spawn(&reg, "Cat", &[]);
    assert_eq!(cat.call("speak", &[]).unwrap(), Value::str("...meow"));
}
