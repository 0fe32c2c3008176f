//! Commands (expression sequences bound to a handler) and the parser that
//! picks the best-explained command for a message.

use super::expr::{Arg, Expr, Match, Scope, UNEXPECTED_TOKENS, Warning, tokenize};

/// Builder for a [`Command`]: add expressions, then bind a handler.
#[derive(Debug)]
pub struct Chain {
    exprs: Vec<Box<dyn Expr>>,
    needs_tz: bool,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// A command that only makes sense once the user has a timezone.
    pub fn new() -> Self {
        Self {
            exprs: Vec::new(),
            needs_tz: true,
        }
    }

    /// A command any user may run.
    pub fn no_tz() -> Self {
        Self {
            needs_tz: false,
            ..Self::new()
        }
    }

    pub fn then(mut self, expr: impl Expr + 'static) -> Self {
        self.exprs.push(Box::new(expr));
        self
    }

    pub fn handle<H>(self, handler: H) -> Command<H> {
        Command {
            exprs: self.exprs,
            needs_tz: self.needs_tz,
            handler,
        }
    }
}

#[derive(Debug)]
pub struct Command<H> {
    exprs: Vec<Box<dyn Expr>>,
    needs_tz: bool,
    handler: H,
}

/// What one command made of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand<H> {
    pub handler: H,
    pub needs_tz: bool,
    pub outcome: Match,
}

impl<H> ParsedCommand<H> {
    pub fn args(&self) -> Option<&[Arg]> {
        match &self.outcome {
            Match::Values(args) => Some(args),
            _ => None,
        }
    }

    pub fn warnings(&self) -> Option<&[Warning]> {
        match &self.outcome {
            Match::Warnings(w) => Some(w),
            _ => None,
        }
    }
}

impl<H: Clone> Command<H> {
    pub fn needs_tz(&self) -> bool {
        self.needs_tz
    }

    /// Run every expression over the message.
    ///
    /// A hard failure makes the whole command a no-match. Warnings accumulate
    /// so the caller can show the most specific correction.
    pub fn parse(&self, message: &str, scope: &Scope) -> ParsedCommand<H> {
        let mut tokens = tokenize(message);
        let mut args = Vec::new();
        let mut warnings = Vec::new();

        for expr in &self.exprs {
            if tokens.is_empty() {
                warnings.push(Warning::ran_out());
                break;
            }
            match expr.match_tokens(&mut tokens, scope) {
                Match::NoMatch => return self.parsed(Match::NoMatch),
                Match::Warnings(w) => warnings.extend(w),
                Match::Values(v) => args.extend(v),
            }
        }
        if !tokens.is_empty() {
            warnings.push(Warning::new(UNEXPECTED_TOKENS));
        }

        self.parsed(if warnings.is_empty() {
            Match::Values(args)
        } else {
            Match::Warnings(warnings)
        })
    }

    fn parsed(&self, outcome: Match) -> ParsedCommand<H> {
        ParsedCommand {
            handler: self.handler.clone(),
            needs_tz: self.needs_tz,
            outcome,
        }
    }
}

/// Every registered command, in priority order.
#[derive(Debug)]
pub struct ArgParser<H> {
    commands: Vec<Command<H>>,
}

impl<H> Default for ArgParser<H> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

impl<H: Clone> ArgParser<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, command: Command<H>) -> Self {
        self.commands.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The best-ranked interpretation; earlier commands win ties.
    ///
    /// `None` only when no command is registered.
    pub fn parse_message(&self, message: &str, scope: &Scope) -> Option<ParsedCommand<H>> {
        self.commands
            .iter()
            .map(|command| command.parse(message, scope))
            .min_by_key(|parsed| parsed.outcome.rank())
    }
}
