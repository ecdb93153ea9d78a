//! Example class hierarchies built on `tabula-core`.
//!
//! These builders register small, realistic hierarchies into a registry and
//! are exercised by the end-to-end tests in `tests/`.

use tabula_core::{arg, receiver, ClassBody, Error, Registry, Value};

/// Register the projectile hierarchy: `Bullet` with a positional
/// constructor and `BigBullet`, which inherits the constructor and adds a
/// size field.
pub fn register_projectiles(reg: &Registry) -> Result<(), Error> {
    reg.declare("Bullet").body(
        ClassBody::new()
            .set("velocity", 0.0)
            .set("angle", 0.0)
            .method("Bullet", |args| {
                let this = receiver(args)?;
                this.set("velocity", arg(args, 1))?;
                this.set("angle", arg(args, 2))?;
                Ok(Value::Nil)
            }),
    )?;
    reg.declare("BigBullet").from(["Bullet"]).body(
        ClassBody::new()
            .set("size", 2.0)
            .inherit_constructor("BigBullet"),
    )?;
    Ok(())
}

/// Register the menagerie: `Animal` with a protected name and a `speak`
/// method, and `Cat` overriding `speak`.
pub fn register_animals(reg: &Registry) -> Result<(), Error> {
    reg.declare("Animal").body(
        ClassBody::new()
            .set("protected__name", "unnamed")
            .method("Animal", |args| {
                let this = receiver(args)?;
                this.set("name", arg(args, 1))?;
                Ok(Value::Nil)
            })
            .method("describe", |args| {
                let this = receiver(args)?;
                let name = this.get("name")?;
                let name = name.as_str().unwrap_or("unnamed").to_string();
                let cry = this.call("speak", &[])?;
                let cry = cry.as_str().unwrap_or("").to_string();
                Ok(Value::from(format!("{name} says {cry}")))
            })
            .method("speak", |_| Ok(Value::str("..."))),
    )?;
    reg.declare("Cat").from(["Animal"]).body(
        ClassBody::new()
            .inherit_constructor("Cat")
            .method("speak", |_| Ok(Value::str("meow"))),
    )?;
    Ok(())
}

/// Register a bank account with a private balance guarded by methods.
pub fn register_accounts(reg: &Registry) -> Result<(), Error> {
    reg.declare("Account").body(
        ClassBody::new()
            .set("private__balance", 0.0)
            .set("const__currency", "EUR")
            .method("Account", |args| {
                let this = receiver(args)?;
                this.set("balance", arg(args, 1))?;
                Ok(Value::Nil)
            })
            .method("deposit", |args| {
                let this = receiver(args)?;
                let balance = this.get("balance")?.as_number().unwrap_or(0.0);
                let amount = arg(args, 1).as_number().unwrap_or(0.0);
                this.set("balance", balance + amount)?;
                this.get("balance")
            })
            .method("balance_of", |args| receiver(args)?.get("balance")),
    )?;
    Ok(())
}
