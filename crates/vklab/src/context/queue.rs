use ash::vk;

///A queue obtained from a [Device](crate::context::Device) together with the
/// family it was created on.
#[derive(Clone, Debug)]
pub struct Queue {
    pub inner: vk::Queue,
    pub family_index: u32,
    ///Capabilities of the family this queue belongs to.
    pub properties: vk::QueueFamilyProperties,
}

///Declares the queues that should be created on one family. Each priority
/// creates one queue.
#[derive(Clone, Debug)]
pub struct QueueBuilder {
    pub family_index: u32,
    pub properties: vk::QueueFamilyProperties,
    pub priorities: Vec<f32>,
}

impl QueueBuilder {
    pub fn new(family_index: u32, properties: vk::QueueFamilyProperties) -> Self {
        QueueBuilder {
            family_index,
            properties,
            priorities: vec![1.0],
        }
    }

    ///Overrides the default single full-priority queue.
    pub fn with_queues(mut self, priorities: Vec<f32>) -> Self {
        self.priorities = priorities;
        self
    }

    pub(crate) fn as_create_info(&self) -> vk::DeviceQueueCreateInfo<'_> {
        vk::DeviceQueueCreateInfo::default()
            .queue_family_index(self.family_index)
            .queue_priorities(&self.priorities)
    }
}
