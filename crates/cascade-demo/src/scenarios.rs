//! Labelled ownership scenarios, each writing what it observes to `out`.

use anyhow::{Context, Result};
use cascade_rc::{Registry, Strong};
use std::io::Write;

const INT: usize = std::mem::size_of::<i32>();

/// `struct obj { int p; struct obj* k; }`
const OBJ: usize = 16;

pub type ScenarioFn = fn(&mut Registry, &mut dyn Write) -> Result<()>;

pub struct Scenario {
    pub name: &'static str,
    pub summary: &'static str,
    pub run: ScenarioFn,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "example1",
        summary: "alias an int and read it back",
        run: alias_read,
    },
    Scenario {
        name: "example2",
        summary: "downgrade the only owner, then fail to upgrade",
        run: single_owner_release,
    },
    Scenario {
        name: "example3",
        summary: "two owners released one after the other",
        run: shared_release,
    },
    Scenario {
        name: "example4",
        summary: "releasing an object releases its member",
        run: member_release,
    },
    Scenario {
        name: "example5",
        summary: "downgrade/upgrade round trip, then cleanup",
        run: round_trip,
    },
    Scenario {
        name: "example6",
        summary: "member aliased from an independently owned object",
        run: shared_member,
    },
    Scenario {
        name: "example7",
        summary: "three-level dependency chain",
        run: chain,
    },
];

fn count(registry: &Registry, handle: &Strong) -> Result<usize> {
    registry
        .strong_count(handle)
        .with_context(|| format!("handle {} is not registered", handle.index()))
}

/// Space-separated strong counts.
fn counts(registry: &Registry, handles: &[Strong]) -> Result<String> {
    let counts = handles
        .iter()
        .map(|h| count(registry, h).map(|c| c.to_string()))
        .collect::<Result<Vec<_>>>()?;
    Ok(counts.join(" "))
}

fn removed(out: &mut dyn Write, upgraded: Option<Strong>) -> Result<()> {
    if upgraded.is_none() {
        writeln!(out, "Reference has been removed")?;
    }
    Ok(())
}

fn alias_read(registry: &mut Registry, out: &mut dyn Write) -> Result<()> {
    let m = registry.create_owned(INT, None)?;
    registry.write_int(&m, 100i32)?;

    let a = registry
        .create_alias(m.as_ptr(), 0, None)
        .context("alias of m")?;
    writeln!(out, "{}", registry.read_int::<i32>(&a)?)?;
    Ok(())
}

fn single_owner_release(registry: &mut Registry, out: &mut dyn Write) -> Result<()> {
    let m = registry.create_owned(INT, None)?;
    registry.write_int(&m, 100i32)?;
    writeln!(out, "{}", registry.read_int::<i32>(&m)?)?;

    let w = registry.downgrade(m);
    writeln!(out, "{}", w.entry_id())?;
    removed(out, registry.upgrade(w))
}

fn shared_release(registry: &mut Registry, out: &mut dyn Write) -> Result<()> {
    let m = registry.create_owned(INT, None)?;
    let a = registry
        .create_alias(m.as_ptr(), 0, None)
        .context("alias of m")?;

    registry.write_int(&m, 2i32)?;
    registry.downgrade(m);

    registry.write_int(&a, 0i32)?;
    writeln!(out, "m = {}", registry.read_int::<i32>(&a)?)?;

    let w = registry.downgrade(a);
    removed(out, registry.upgrade(w))
}

fn member_release(registry: &mut Registry, out: &mut dyn Write) -> Result<()> {
    let m = registry.create_owned(OBJ, None)?;
    registry.create_owned(INT, Some(&m))?;

    let w = registry.downgrade(m);
    writeln!(out, "{}", u8::from(w.is_invalid()))?;
    removed(out, registry.upgrade(w))
}

fn round_trip(registry: &mut Registry, out: &mut dyn Write) -> Result<()> {
    let m = registry.create_owned(INT, None)?;
    let a = registry
        .create_alias(m.as_ptr(), 0, None)
        .context("alias of m")?;

    let w = registry.downgrade(a);
    write!(out, "{} ", count(registry, &m)?)?;

    let a = registry.upgrade(w).context("upgrade of live weak handle")?;
    write!(out, "{} ", count(registry, &m)?)?;

    registry.downgrade(a);
    let k = registry.downgrade(m);
    writeln!(out, "{}", count(registry, &m)?)?;

    removed(out, registry.upgrade(k))?;
    registry.cleanup();
    writeln!(out, "{}", u8::from(registry.upgrade(k).is_none()))?;
    Ok(())
}

fn shared_member(registry: &mut Registry, out: &mut dyn Write) -> Result<()> {
    let m = registry.create_owned(OBJ, None)?;
    let n = registry.create_owned(OBJ, None)?;
    let kk = registry
        .create_alias(n.as_ptr(), OBJ, Some(&m))
        .context("alias of n as member of m")?;

    write!(out, "{} ", count(registry, &m)?)?;
    writeln!(out, "{}", count(registry, &n)?)?;

    registry.downgrade(m);
    write!(out, "{} ", count(registry, &m)?)?;
    write!(out, "{} ", count(registry, &kk)?)?;
    writeln!(out, "{}", count(registry, &n)?)?;
    Ok(())
}

fn chain(registry: &mut Registry, out: &mut dyn Write) -> Result<()> {
    let a = registry.create_owned(OBJ, None)?;
    let b = registry.create_owned(OBJ, Some(&a))?;
    let c = registry.create_owned(OBJ, Some(&b))?;

    registry.downgrade(c);
    writeln!(out, "{}", counts(registry, &[a, b, c])?)?;

    registry.downgrade(c);
    writeln!(out, "{}", counts(registry, &[a, b, c])?)?;

    registry.downgrade(a);
    writeln!(out, "{}", counts(registry, &[a, b, c])?)?;
    Ok(())
}
