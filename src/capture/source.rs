use super::{Frame, Region};
use crate::error::Result;

/// Источник кадров для одной области.
///
/// Обе стратегии (потоковая со слотом и опрашивающая) взаимозаменяемы за этим
/// контрактом: `latest_frame` никогда не ждёт бесконечно и возвращает `None`,
/// если свежего кадра ещё нет.
pub trait FrameSource: Send {
    /// Перенастроить захват на новую область (stop → reconfigure → start)
    fn configure(&mut self, region: Region) -> Result<()>;

    /// Самый свежий кадр или `None`
    fn latest_frame(&mut self) -> Option<Frame>;

    /// Остановить захват и освободить ресурсы
    fn shutdown(&mut self);

    fn kind(&self) -> &'static str;
}
