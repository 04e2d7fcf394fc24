use super::Channel;

/// Доставленное подписке сообщение: канал рассылки и копия полезной нагрузки.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    pub channel: Channel,
    pub payload: T,
}

impl<T> Message<T> {
    pub fn new(
        channel: Channel,
        payload: T,
    ) -> Self {
        Self { channel, payload }
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    /// Тест проверяет создание сообщения с бинарной полезной нагрузкой.
    #[test]
    fn test_message_with_bytes_payload() {
        let ch = Channel::new("Net.Packet").unwrap();
        let msg = Message::new(ch.clone(), Bytes::from_static(&[0, 255, 128]));

        assert_eq!(msg.channel, ch);
        assert_eq!(msg.payload.as_ref(), &[0, 255, 128]);
    }

    #[test]
    fn test_into_payload() {
        let msg = Message::new(Channel::default_channel(), 7u32);
        assert_eq!(msg.into_payload(), 7);
    }
}
