//! Parts shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use partwire::{
    implements, Assembly, Attribute, Dispose, DynError, Imports, Parameter, Part,
};

pub const NAMED_IMPLEMENTATION: &str = "NamedImplementation";

pub trait CompositionTest: Send + Sync {
    fn implementation(&self) -> &'static str;
}

pub trait CompositionTest2: Send + Sync {
    fn implementation(&self) -> &'static str;
}

pub struct CompositionTestImplementation;
impl CompositionTest for CompositionTestImplementation {
    fn implementation(&self) -> &'static str {
        "CompositionTestImplementation"
    }
}
implements!(CompositionTestImplementation => dyn CompositionTest);
impl Part for CompositionTestImplementation {
    fn attributes() -> Vec<Attribute> {
        vec![Attribute::export::<dyn CompositionTest, Self>()]
    }

    fn construct(_: &Imports<'_>) -> Result<Self, DynError> {
        Ok(CompositionTestImplementation)
    }
}

pub struct NamedCompositionTestImplementation;
impl CompositionTest for NamedCompositionTestImplementation {
    fn implementation(&self) -> &'static str {
        "NamedCompositionTestImplementation"
    }
}
implements!(NamedCompositionTestImplementation => dyn CompositionTest);
impl Part for NamedCompositionTestImplementation {
    fn attributes() -> Vec<Attribute> {
        vec![Attribute::named_export::<dyn CompositionTest, Self>(
            NAMED_IMPLEMENTATION,
        )]
    }

    fn construct(_: &Imports<'_>) -> Result<Self, DynError> {
        Ok(NamedCompositionTestImplementation)
    }
}

/// Not a part, only ever composed as an override
pub struct StubCompositionTestImplementation;
impl CompositionTest for StubCompositionTestImplementation {
    fn implementation(&self) -> &'static str {
        "StubCompositionTestImplementation"
    }
}

pub fn stub() -> Arc<dyn CompositionTest> {
    Arc::new(StubCompositionTestImplementation)
}

pub struct CompositionTest2Implementation;
impl CompositionTest2 for CompositionTest2Implementation {
    fn implementation(&self) -> &'static str {
        "CompositionTest2Implementation"
    }
}
implements!(CompositionTest2Implementation => dyn CompositionTest2);
impl Part for CompositionTest2Implementation {
    fn attributes() -> Vec<Attribute> {
        vec![Attribute::export::<dyn CompositionTest2, Self>()]
    }

    fn construct(_: &Imports<'_>) -> Result<Self, DynError> {
        Ok(CompositionTest2Implementation)
    }
}

pub fn test_assembly() -> Assembly {
    Assembly::new("unit-tests")
        .with_part::<CompositionTestImplementation>()
        .with_part::<NamedCompositionTestImplementation>()
        .with_part::<CompositionTest2Implementation>()
}

// ---------------------------------------------------------------------------
// Lifecycle parts, they record constructions and disposals into a shared log

#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<String>>,
}
impl EventLog {
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

pub trait Tracked: Send + Sync {
    fn label(&self) -> &'static str;
}

/// Shared, exported as itself and as `dyn Tracked`
pub struct Connection {
    log: Arc<EventLog>,
}
implements!(Connection => dyn Tracked);
impl Tracked for Connection {
    fn label(&self) -> &'static str {
        "connection"
    }
}
impl Part for Connection {
    fn attributes() -> Vec<Attribute> {
        vec![
            Attribute::export::<Connection, Self>(),
            Attribute::export::<dyn Tracked, Self>(),
            Attribute::Shared,
        ]
    }

    fn parameters() -> Vec<Parameter> {
        vec![Parameter::single::<EventLog>("log")]
    }

    fn construct(imports: &Imports<'_>) -> Result<Self, DynError> {
        let log: Arc<EventLog> = imports.single("log")?;
        log.record("construct connection");
        Ok(Connection { log })
    }

    fn dispose(&self) {
        self.log.record("dispose connection");
    }
}

/// Shared, depends on the connection
pub struct Session {
    pub connection: Arc<Connection>,
    log: Arc<EventLog>,
}
impl Part for Session {
    fn attributes() -> Vec<Attribute> {
        vec![Attribute::export::<Session, Self>(), Attribute::Shared]
    }

    fn parameters() -> Vec<Parameter> {
        vec![
            Parameter::single::<EventLog>("log"),
            Parameter::single::<Connection>("connection"),
        ]
    }

    fn construct(imports: &Imports<'_>) -> Result<Self, DynError> {
        let log: Arc<EventLog> = imports.single("log")?;
        let connection = imports.single("connection")?;
        log.record("construct session");
        Ok(Session { connection, log })
    }

    fn dispose(&self) {
        self.log.record("dispose session");
    }
}

/// Not shared, a new one for every request
pub struct Request {
    log: Arc<EventLog>,
}
impl Part for Request {
    fn attributes() -> Vec<Attribute> {
        vec![Attribute::export::<Request, Self>()]
    }

    fn parameters() -> Vec<Parameter> {
        vec![Parameter::single::<EventLog>("log")]
    }

    fn construct(imports: &Imports<'_>) -> Result<Self, DynError> {
        let log: Arc<EventLog> = imports.single("log")?;
        log.record("construct request");
        Ok(Request { log })
    }

    fn dispose(&self) {
        self.log.record("dispose request");
    }
}

/// Handed to the composition as a disposable override
pub struct OwnedResource {
    pub name: &'static str,
    pub log: Arc<EventLog>,
}
impl Dispose for OwnedResource {
    fn dispose(&self) {
        self.log.record(format!("dispose {}", self.name));
    }
}

pub fn lifecycle_assembly() -> Assembly {
    Assembly::new("lifecycle")
        .with_part::<Connection>()
        .with_part::<Session>()
        .with_part::<Request>()
}
