//! Буферный writer для тестов, проверяющих содержимое логов.

use std::sync::{Arc, Mutex};

use tracing_subscriber::{fmt, prelude::*, registry::Registry};

#[derive(Clone, Default)]
pub(crate) struct VecMakeWriter(pub Arc<Mutex<Vec<u8>>>);

impl VecMakeWriter {
    pub fn contents(&self) -> String {
        let out = self.0.lock().unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }
}

impl<'a> fmt::MakeWriter<'a> for VecMakeWriter {
    type Writer = VecWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        VecWriterGuard(self.0.clone())
    }
}

pub(crate) struct VecWriterGuard(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for VecWriterGuard {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Выполняет `f` под локальным subscriber и возвращает всё, что было
/// залогировано, без ANSI-раскраски.
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    let writer = VecMakeWriter::default();
    let layer = fmt::layer()
        .with_writer(writer.clone())
        .with_ansi(false)
        .with_target(false);
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    writer.contents()
}
