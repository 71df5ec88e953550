// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the census data.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// The raw row schema and label parsing
pub mod census;

// Core abstractions (traits) that other layers implement
pub mod traits;
