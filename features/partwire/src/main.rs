use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use partwire::{
    implements, Assembly, Attribute, CompositionHelper, Conventions, Dispose, DynError, Imports,
    Parameter, Part, TypeInfo,
};

fn main() -> Result<(), DynError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let assembly = Assembly::new("demo")
        .with_part::<SystemClock>()
        .with_part::<Greeter>();

    let mut conventions = Conventions::new();
    conventions.shared::<Greeter>();

    let mut helper = CompositionHelper::new();
    helper
        .add_assembly_with_conventions(assembly, conventions, [TypeInfo::of::<SystemClock>()])?
        .compose_export::<dyn Clock>(Arc::new(FixedClock(9)))?
        .compose_disposable_export(Arc::new(AuditTrail::default()))?;

    let greeter = helper.get_export::<Greeter>()?;
    println!("{:?}", helper);
    println!("{}", greeter.greet("world"));
    println!("exportable: {:?}", helper.exportable_types()?);

    helper.close();
    Ok(())
}

trait Clock: Send + Sync {
    fn hour(&self) -> u8;
}

struct SystemClock;
impl Clock for SystemClock {
    fn hour(&self) -> u8 {
        12
    }
}
implements!(SystemClock => dyn Clock);
impl Part for SystemClock {
    fn attributes() -> Vec<Attribute> {
        vec![Attribute::export::<dyn Clock, Self>()]
    }

    fn construct(_: &Imports<'_>) -> Result<Self, DynError> {
        Ok(SystemClock)
    }
}

struct FixedClock(u8);
impl Clock for FixedClock {
    fn hour(&self) -> u8 {
        self.0
    }
}

#[derive(Default)]
struct AuditTrail {
    greetings: AtomicUsize,
}
impl Dispose for AuditTrail {
    fn dispose(&self) {
        println!(
            "audit trail released after {} greetings",
            self.greetings.load(Ordering::Relaxed)
        );
    }
}

struct Greeter {
    clock: Arc<dyn Clock>,
    audit: Arc<AuditTrail>,
}
impl Greeter {
    fn greet(&self, name: &str) -> String {
        self.audit.greetings.fetch_add(1, Ordering::Relaxed);
        match self.clock.hour() {
            0..=11 => format!("Good morning, {name}"),
            _ => format!("Hello, {name}"),
        }
    }
}
impl Part for Greeter {
    fn attributes() -> Vec<Attribute> {
        vec![Attribute::export::<Greeter, Self>()]
    }

    fn parameters() -> Vec<Parameter> {
        vec![
            Parameter::single::<dyn Clock>("clock"),
            Parameter::single::<AuditTrail>("audit"),
        ]
    }

    fn construct(imports: &Imports<'_>) -> Result<Self, DynError> {
        Ok(Greeter {
            clock: imports.single("clock")?,
            audit: imports.single("audit")?,
        })
    }

    fn dispose(&self) {
        println!("greeter released");
    }
}
