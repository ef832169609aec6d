use streambench::{Registry, register_stream_benchmarks};

fn main() -> anyhow::Result<()> {
    let mut registry = Registry::new();
    register_stream_benchmarks(&mut registry)?;
    streambench::run(registry)
}
