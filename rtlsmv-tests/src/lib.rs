#[cfg(test)]
mod model;
