//! Wrapping interceptor chains in 0, 1 and 2 argument forms.
//!
//! A chain starts from a base function. Each `intercept` call adds a handler
//! that receives the arguments and a `next` callable; `next` invokes the rest
//! of the chain. The first registered handler is the outermost one, so for
//! handlers that call `next` before returning, invocation order equals
//! registration order. A handler that does not call `next` short-circuits
//! everything registered after it, including the base function.

type Handler0<R> = Box<dyn Fn(&dyn Fn() -> R) -> R + Send + Sync>;
type Handler1<P, R> = Box<dyn Fn(P, &dyn Fn(P) -> R) -> R + Send + Sync>;
type Handler2<P0, P1, R> = Box<dyn Fn(P0, P1, &dyn Fn(P0, P1) -> R) -> R + Send + Sync>;

/// A chain of wrapping handlers around a zero-argument function.
pub struct Interceptable0<R> {
    function: Box<dyn Fn() -> R + Send + Sync>,
    handlers: Vec<Handler0<R>>,
}

impl<R> Interceptable0<R> {
    /// Creates a chain around a base function.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        Self {
            function: Box::new(function),
            handlers: Vec::new(),
        }
    }

    /// Adds a handler inside all previously registered handlers.
    pub fn intercept<H>(&mut self, handler: H)
    where
        H: Fn(&dyn Fn() -> R) -> R + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Invokes the outermost handler.
    pub fn execute(&self) -> R {
        self.call_at(0)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if only the base function is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn call_at(&self, index: usize) -> R {
        match self.handlers.get(index) {
            Some(handler) => handler(&|| self.call_at(index + 1)),
            None => (self.function)(),
        }
    }
}

/// A chain of wrapping handlers around a one-argument function.
pub struct Interceptable1<P, R> {
    function: Box<dyn Fn(P) -> R + Send + Sync>,
    handlers: Vec<Handler1<P, R>>,
}

impl<P, R> Interceptable1<P, R> {
    /// Creates a chain around a base function.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(P) -> R + Send + Sync + 'static,
    {
        Self {
            function: Box::new(function),
            handlers: Vec::new(),
        }
    }

    /// Adds a handler inside all previously registered handlers.
    pub fn intercept<H>(&mut self, handler: H)
    where
        H: Fn(P, &dyn Fn(P) -> R) -> R + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Invokes the outermost handler.
    pub fn execute(&self, param: P) -> R {
        self.call_at(0, param)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if only the base function is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn call_at(&self, index: usize, param: P) -> R {
        match self.handlers.get(index) {
            Some(handler) => handler(param, &|next| self.call_at(index + 1, next)),
            None => (self.function)(param),
        }
    }
}

/// A chain of wrapping handlers around a two-argument function.
pub struct Interceptable2<P0, P1, R> {
    function: Box<dyn Fn(P0, P1) -> R + Send + Sync>,
    handlers: Vec<Handler2<P0, P1, R>>,
}

impl<P0, P1, R> Interceptable2<P0, P1, R> {
    /// Creates a chain around a base function.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(P0, P1) -> R + Send + Sync + 'static,
    {
        Self {
            function: Box::new(function),
            handlers: Vec::new(),
        }
    }

    /// Adds a handler inside all previously registered handlers.
    pub fn intercept<H>(&mut self, handler: H)
    where
        H: Fn(P0, P1, &dyn Fn(P0, P1) -> R) -> R + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Invokes the outermost handler.
    pub fn execute(&self, first: P0, second: P1) -> R {
        self.call_at(0, first, second)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if only the base function is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn call_at(&self, index: usize, first: P0, second: P1) -> R {
        match self.handlers.get(index) {
            Some(handler) => handler(first, second, &|a, b| self.call_at(index + 1, a, b)),
            None => (self.function)(first, second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_empty_chain_calls_function() {
        let chain = Interceptable0::new(|| 42);
        assert!(chain.is_empty());
        assert_eq!(chain.execute(), 42);
    }

    #[test]
    fn test_registration_order_is_invocation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let base_log = Arc::clone(&log);
        let mut chain = Interceptable0::new(move || base_log.lock().push("base"));
        for label in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            chain.intercept(move |next| {
                log.lock().push(label);
                next();
            });
        }

        chain.execute();
        assert_eq!(chain.len(), 3);
        assert_eq!(*log.lock(), vec!["first", "second", "third", "base"]);
    }

    #[test]
    fn test_handler_can_short_circuit() {
        let mut chain = Interceptable1::new(|value: i32| value * 2);
        chain.intercept(|value, next| if value < 0 { 0 } else { next(value) });
        chain.intercept(|value, next| next(value + 1));

        assert_eq!(chain.execute(-5), 0);
        assert_eq!(chain.execute(5), 12);
    }

    #[test]
    fn test_outer_handler_wraps_inner_result() {
        let mut chain = Interceptable1::new(|name: String| format!("<{name}>"));
        chain.intercept(|name, next| format!("outer{}", next(name)));
        chain.intercept(|name, next| format!("inner{}", next(name)));

        assert_eq!(chain.execute("x".to_string()), "outerinner<x>");
    }

    #[test]
    fn test_two_argument_chain_rewrites_arguments() {
        let mut chain = Interceptable2::new(|a: i32, b: i32| a - b);
        chain.intercept(|a, b, next| next(b, a));

        assert_eq!(chain.execute(10, 3), -7);
        assert_eq!(chain.len(), 1);
    }
}
