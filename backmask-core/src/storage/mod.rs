pub mod checksum;
pub mod pcm_writer;
