//! Cross-module delivery scenarios driven through the public API.
