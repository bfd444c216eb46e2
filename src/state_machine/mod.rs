pub mod effect;
pub mod live_location;
pub mod selection;
pub mod tracking;

pub use effect::{Effect, EffectQueue};

/// The [`StateMachine`] trait provides calling semantics and indicates the upholding of invariants
/// that guarantee deterministic behavior.
///
/// # Functionality
/// Each machine of the client reacts to a closed set of inputs: user selections, completions of
/// requests it asked for, timer ticks and location samples. Inputs are grouped into one
/// [`Input`](StateMachine::Input) enum per machine and dispatched by
/// [`process_input`](StateMachine::process_input) to the transition handling that variant.
///
/// A transition never performs the work it decides on. Requests, timers and view updates are
/// queued as [`Effect`]s and drained through [`poll_output`](StateMachine::poll_output) by the
/// controller, which executes them and feeds their completions back in as input. A transition
/// is therefore a function of `(state, input) -> (state, effects)`.
///
/// # Invariants
/// Implementors *must* uphold all the following invariants.
///
/// ## No Interior Mutability
/// All state is owned and mutated only through `&mut self`. No [`std::cell`] containers, no
/// [`std::sync`] locks, no reference counted sharing.
///
/// ## No IO
/// No network, no file system, no host geolocation. Anything that talks to the outside world is
/// an [`Effect`].
///
/// ### No System Time
/// Machines never read a clock. Sample ages are judged by the location source and periods are
/// emitted as data inside [`Effect::ScheduleTicks`], so replaying the same inputs yields the
/// same effects.
///
/// ### No System RNG
/// Machines never generate identifiers. Tracking session ids arrive inside
/// [`TrackingInput::Start`](tracking::TrackingInput::Start), minted by the controller.
///
/// ## No Concurrency, No Async
/// Transitions run to completion on the caller's thread. The controller processes one input at
/// a time from a single queue, which is what rules out two mutations racing each other.
///
/// ## Staleness Is Checked At Resolution Time
/// Every request effect carries the identity of the selection or tracking session that issued
/// it. A completion whose identity is no longer current is dropped without surfacing anything.
///
/// # Side Effects
/// Logging through `tracing` is the one permitted side effect. The logic *must not* depend on
/// it.
///
/// # Example
/// ```ignore
/// let mut machine = SelectionMachine::new();
/// machine.process_input(SelectionInput::SelectOrigin(origin));
///
/// while let Some(effect) = machine.poll_output() {
///     controller.execute(effect);
/// }
/// ```
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) by the state machine.
    type Output;

    /// Process the provided `input` into the state machine.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the oldest pending output if present.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
