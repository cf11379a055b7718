//! Inbound message dispatch
//!
//! Every decoded server message is offered to every registered handler, in
//! registration order. Handlers pick out the variant they care about and
//! ignore the rest, so unknown variants pass through without effect.

use crate::game::StateSink;
use log::debug;
use shared::ServerMessage;

pub trait Handler: Send {
    fn handle(&mut self, message: &ServerMessage);
}

impl<F> Handler for F
where
    F: FnMut(&ServerMessage) + Send,
{
    fn handle(&mut self, message: &ServerMessage) {
        self(message)
    }
}

/// Applies `Register` messages: arena dimensions and local identity.
pub struct RegisterHandler {
    sink: StateSink,
}

impl RegisterHandler {
    pub fn new(sink: StateSink) -> Self {
        Self { sink }
    }
}

impl Handler for RegisterHandler {
    fn handle(&mut self, message: &ServerMessage) {
        let ServerMessage::Register(register) = message else {
            return;
        };

        debug!(
            "Registered: arena {}x{}, id {:?}",
            register.field_width, register.field_height, register.uuid
        );
        self.sink.update(|state| state.apply_register(register));
    }
}

/// Applies `Turn` broadcasts: roster and food.
pub struct TurnHandler {
    sink: StateSink,
}

impl TurnHandler {
    pub fn new(sink: StateSink) -> Self {
        Self { sink }
    }
}

impl Handler for TurnHandler {
    fn handle(&mut self, message: &ServerMessage) {
        let ServerMessage::Turn(turn) = message else {
            return;
        };

        self.sink.update(|state| state.apply_turn(turn));
    }
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<Box<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher preloaded with the handlers that keep `sink` current.
    pub fn with_session_handlers(sink: &StateSink) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.feed(RegisterHandler::new(sink.clone()));
        dispatcher.feed(TurnHandler::new(sink.clone()));
        dispatcher
    }

    pub fn feed<H>(&mut self, handler: H)
    where
        H: Handler + 'static,
    {
        self.feed_boxed(Box::new(handler));
    }

    pub fn feed_boxed(&mut self, handler: Box<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&mut self, message: &ServerMessage) {
        if let ServerMessage::Unknown { tag } = message {
            debug!("No handler expects variant {}", tag);
        }

        for handler in &mut self.handlers {
            handler.handle(message);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
